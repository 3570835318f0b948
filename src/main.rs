//! `luungs` terminal front end.
//!
//! Important env variables:
//!   LUUNGS_API_URL      : backend base URL (default "https://srv451534.hstgr.cloud/api")
//!   LUUNGS_TIMEOUT_SECS : per-request timeout (default 20)
//!   LUUNGS_SESSION_PATH : file holding the logged-in user id (default ~/.luungs/user_id)
//!   LUUNGS_CONFIG_PATH  : optional TOML config (see config.rs)
//!   OPENAI_API_KEY      : enables the chat assistant if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-3.5-turbo"
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use luungs::app::App;
use luungs::cli::Command;
use luungs::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cmd = match Command::parse(std::env::args().skip(1)) {
    Ok(cmd) => cmd,
    Err(e) => {
      eprintln!("{e}");
      std::process::exit(2);
    }
  };
  let app = App::from_env()?;
  let out = app.run(cmd).await?;
  println!("{out}");
  Ok(())
}
