use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match passdeck_app_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("passdeck: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
