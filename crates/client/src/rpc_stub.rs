//! Local JSON-RPC node serving canned replies, for transport-level tests

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::rpc::RpcTransport;

/// What the node answers to one request
pub(crate) enum Reply {
    Result(Value),
    Error(i64, &'static str),
}

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;
type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

/// HTTP JSON-RPC server on an ephemeral port. Stops when dropped.
pub(crate) struct RpcStub {
    url: String,
    calls: CallLog,
    task: JoinHandle<()>,
}

impl RpcStub {
    pub(crate) async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handler: Handler = Arc::new(handler);
        let calls = CallLog::default();

        let task = tokio::spawn({
            let calls = calls.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let handler = handler.clone();
                    let calls = calls.clone();
                    tokio::spawn(async move {
                        let _ = serve(stream, handler, calls).await;
                    });
                }
            }
        });

        Self { url, calls, task }
    }

    pub(crate) fn transport(&self) -> RpcTransport {
        RpcTransport::new(self.url.clone())
    }

    /// Methods called so far, in order
    pub(crate) fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(method, _)| method.clone()).collect()
    }

    /// Params of the first call to `method`
    pub(crate) fn params_of(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }
}

impl Drop for RpcStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Answer requests on one connection until the client closes it
async fn serve(mut stream: TcpStream, handler: Handler, calls: CallLog) -> std::io::Result<()> {
    while let Some(request) = read_request(&mut stream).await? {
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].clone();
        calls.lock().unwrap().push((method.clone(), params.clone()));

        let mut response = json!({ "jsonrpc": "2.0", "id": request["id"].clone() });
        match handler(&method, &params) {
            Reply::Result(result) => response["result"] = result,
            Reply::Error(code, message) => {
                response["error"] = json!({ "code": code, "message": message });
            }
        }

        let body = response.to_string();
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(body.as_bytes()).await?;
    }
    Ok(())
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<Value>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..header_end + content_length];
    Ok(Some(serde_json::from_slice(body).unwrap_or(Value::Null)))
}
