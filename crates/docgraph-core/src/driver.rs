//! Executes session commands against the API and reports what happened.

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::client::ApiClient;
use crate::session::{Command, QueryEvent, SessionEvent};

/// Run `command` on the tokio runtime in the background.
pub fn spawn(client: &ApiClient, command: Command, tx: UnboundedSender<SessionEvent>) -> JoinHandle<()> {
    let client = client.clone();
    tokio::spawn(async move { run_command(&client, command, tx).await })
}

/// Carry out one command to completion. A closed channel just means nobody
/// is listening any more.
pub async fn run_command(client: &ApiClient, command: Command, tx: UnboundedSender<SessionEvent>) {
    match command {
        Command::Query { text } => run_query(client, &text, &tx).await,
        Command::Upload { file } => {
            let result = client.upload_document(&file).await.map(|receipt| {
                debug!(doc_id = ?receipt.doc_id, message = ?receipt.message, "upload accepted");
            });
            if let Err(err) = &result {
                error!(file = %file.name, error = %err, "upload request failed");
            }
            let _ = tx.send(SessionEvent::Upload {
                file_name: file.name,
                result,
            });
        }
        Command::RefreshGraph { generation } => {
            let result = client.graph().await;
            if let Err(err) = &result {
                error!(generation, error = %err, "graph request failed");
            }
            let _ = tx.send(SessionEvent::Graph { generation, result });
        }
        Command::CheckHealth => {
            let result = client.health().await;
            let _ = tx.send(SessionEvent::Health(result));
        }
    }
}

async fn run_query(client: &ApiClient, text: &str, tx: &UnboundedSender<SessionEvent>) {
    let mut stream = match client.query(text).await {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "query request failed");
            let _ = tx.send(SessionEvent::Query(QueryEvent::Failed(err)));
            return;
        }
    };

    loop {
        match stream.next_frame().await {
            Ok(Some(frame)) => {
                if tx.send(SessionEvent::Query(QueryEvent::Frame(frame))).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = tx.send(SessionEvent::Query(QueryEvent::Finished));
                return;
            }
            Err(err) => {
                error!(error = %err, "query stream broke off");
                let _ = tx.send(SessionEvent::Query(QueryEvent::Failed(err)));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::FileSelection;
    use tokio::sync::mpsc;

    /// An address nothing is listening on.
    async fn closed_address() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api", addr)
    }

    #[tokio::test]
    async fn test_query_transport_failure_is_reported() {
        let client = ApiClient::new(&closed_address().await);
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_command(&client, Command::Query { text: "hi".into() }, tx).await;

        match rx.recv().await {
            Some(SessionEvent::Query(QueryEvent::Failed(_))) => {}
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_generation() {
        let client = ApiClient::new(&closed_address().await);
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn(&client, Command::RefreshGraph { generation: 7 }, tx)
            .await
            .unwrap();

        match rx.recv().await {
            Some(SessionEvent::Graph { generation, result }) => {
                assert_eq!(generation, 7);
                assert!(result.is_err());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_fails_before_sending() {
        let client = ApiClient::new(&closed_address().await);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let file = FileSelection::new("ghost.pdf", 10, "application/pdf");
        run_command(&client, Command::Upload { file }, tx).await;

        match rx.recv().await {
            Some(SessionEvent::Upload { file_name, result }) => {
                assert_eq!(file_name, "ghost.pdf");
                assert!(matches!(result, Err(crate::error::ApiError::Io { .. })));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
