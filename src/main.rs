use log::error;
use nu_ansi_term::Color::Red;
use qna::{setup_log, start_server};

#[tokio::main]
async fn main() {
    setup_log();

    let schema_name = "qna";

    if let Err(e) = start_server(schema_name, 3000).await {
        error!("{}", Red.paint("Could not start server. Is the database running?").to_string());
        error!("{}", Red.paint(format!("{}", e)).to_string());
    };
}
