//! NDJSON request/response bridge over stdio.
//!
//! One JSON object per line in, one per line out. Responses use the REST
//! shapes (`{datas, total_rows, total_pages}` for
//! selects, `{datas}` otherwise) and failures carry `{code, message}` plus
//! the HTTP status a web front end should use.

mod handler;
mod io;
mod protocol;

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::{core::Gateway, error::AppResult};

pub use handler::BridgeHandler;
pub use io::NdjsonIo;
pub use protocol::{BridgeRequest, BridgeResponse, PROTOCOL_VERSION};

pub async fn run(gateway: Gateway) -> AppResult<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(gateway, stdin, stdout).await
}

pub async fn serve<R, W>(gateway: Gateway, reader: R, writer: W) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut io = NdjsonIo::new(reader, writer);
    let handler = BridgeHandler::new(gateway);

    while let Some(line) = io.read_line().await? {
        if line.is_empty() {
            continue;
        }

        let req: BridgeRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                // Unknown id; still answer so the caller is not left waiting.
                tracing::warn!(error = %e, "unparseable bridge request");
                let err = crate::error::AppError::validation(format!("malformed request: {e}"));
                io.write_json_line(&BridgeResponse::<()>::err(PROTOCOL_VERSION, String::new(), &err))
                    .await?;
                continue;
            }
        };

        let resp = handler.handle(req).await;
        io.write_json_line(&resp).await?;
    }

    Ok(())
}
