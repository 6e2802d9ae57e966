use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;

use studyspark::attach::{self, Attachment};
use studyspark::config::Config;
use studyspark::history::HistoryBuffer;
use studyspark::relay::{RelayClient, RequestBundle};
use studyspark::render;
use studyspark::speech::{self, Speaker};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load();
    let client = RelayClient::new(&config.relay);
    let mut history = HistoryBuffer::new();
    let mut speaker = Speaker::new();
    let mut staged: Option<Attachment> = None;
    let mut last_reply: Option<String> = None;

    println!("studyspark — ask a question, or: /attach <path>  /copy  /speak  /clear  /quit");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        if let Some(att) = &staged {
            print!("[{}] > ", att.file_name);
        } else {
            print!("> ");
        }
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        // Empty input with nothing attached: silently ignored
        if line.is_empty() && staged.is_none() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                history.clear();
                last_reply = None;
                println!("History cleared.");
            }
            "/copy" => match &last_reply {
                Some(text) => {
                    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone())) {
                        Ok(()) => println!("Copied."),
                        Err(e) => println!("Clipboard unavailable: {}", e),
                    }
                }
                None => println!("Nothing to copy yet."),
            },
            "/speak" => match &last_reply {
                Some(text) => {
                    let voice = speech::detect_voice(text, &config.speech);
                    if let Err(e) = speaker.speak(text, voice) {
                        println!("{}", e);
                    }
                }
                None => println!("Nothing to speak yet."),
            },
            _ if line.starts_with("/attach") => {
                let path = line["/attach".len()..].trim();
                if path.is_empty() {
                    println!("Usage: /attach <path>");
                } else {
                    match attach::prepare(Path::new(path)) {
                        Ok(att) => {
                            println!("Attached: {}", att.file_name);
                            staged = Some(att);
                        }
                        Err(e) => println!("{:#}", e),
                    }
                }
            }
            _ if line.starts_with('/') => {
                println!("Unknown command: {}", line);
            }
            prompt => {
                // One request cycle at a time: we hold the prompt until this
                // one reaches a terminal state. The staged file is consumed
                // whether the cycle succeeds or not.
                let history_json = history.to_json()?;
                let Some(bundle) = RequestBundle::compose(prompt, &history_json, staged.take())
                else {
                    continue;
                };

                println!("Thinking...");
                match client.ask(&bundle, |status| println!("{}", status)).await {
                    Ok(raw) => {
                        let cleaned = render::clean_response(&raw);
                        println!();
                        print!("{}", render::render_markdown(&cleaned));
                        if render::has_mermaid(&cleaned) {
                            println!("(diagram source included — /copy and paste it into a mermaid renderer)");
                        }
                        println!();
                        // History gets the raw reply; cleanup is display-only
                        history.record_exchange(bundle.prompt(), &raw);
                        last_reply = Some(cleaned);
                    }
                    Err(err) => {
                        println!("Could not reach the study relay: {}", err);
                    }
                }
            }
        }
    }

    Ok(())
}
