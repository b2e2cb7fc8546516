//! Procure - 采购编码生成智能体
//!
//! 入口：初始化日志、加载配置与索引，然后在标准输入上运行单对话 REPL。
//! 特殊命令：/codes 查看已保存编码，/remove N 删除第 N 条（从 1 开始），/state 打印会话状态 JSON，/quit 退出。

use anyhow::Context;
use procure::config::load_config;
use procure::{create_agent_components, process_message};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procure::observability::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;
    let components = create_agent_components(&cfg).context("Failed to create agent")?;
    let mut conversation = components.new_conversation(uuid::Uuid::new_v4().to_string());

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/codes" => {
                let text = conversation.state.export_codes_text();
                let text = if text.is_empty() {
                    "(no codes saved)".to_string()
                } else {
                    text
                };
                stdout.write_all(format!("{text}\n").as_bytes()).await?;
                continue;
            }
            "/state" => {
                let json = serde_json::to_string_pretty(&conversation.state)?;
                stdout.write_all(format!("{json}\n").as_bytes()).await?;
                continue;
            }
            _ => {}
        }

        if let Some(arg) = input.strip_prefix("/remove") {
            let removed = arg
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| conversation.state.remove_code(index));
            let reply = match removed {
                Some(snap) => format!("Removed. {} code(s) left.", snap.snapshot.procurement_codes().len()),
                None => "Usage: /remove N (N is the line number shown by /codes)".to_string(),
            };
            stdout.write_all(format!("{reply}\n").as_bytes()).await?;
            continue;
        }

        match process_message(&components, &mut conversation, input).await {
            Ok(result) => {
                stdout
                    .write_all(format!("{}\n", result.response).as_bytes())
                    .await?;
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                stdout.write_all(format!("Error: {e}\n").as_bytes()).await?;
            }
        }
    }

    Ok(())
}
