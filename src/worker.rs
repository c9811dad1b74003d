use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::domain::{Command, Message, ViewerError};
use crate::orchestrator::FetchRequest;
use crate::query::QueryMode;
use crate::service::DataService;

/// Runs model commands against the data service on a small thread pool.
///
/// Results are posted back as messages and picked up by the event loop, which
/// stays the only writer of the view state.
pub struct Executor {
    pool: ThreadPool,
    service: Arc<dyn DataService>,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Executor {
    pub fn new(service: Arc<dyn DataService>, workers: usize) -> Result<Self, ViewerError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|idx| format!("csvview-worker-{idx}"))
            .build()?;
        let (sender, receiver) = mpsc::channel();
        Ok(Self {
            pool,
            service,
            sender,
            receiver,
        })
    }

    pub fn execute(&self, command: Command) {
        trace!("Execute {command:?}");
        let service = Arc::clone(&self.service);
        let sender = self.sender.clone();
        self.pool.spawn(move || {
            let message = run(service.as_ref(), command);
            // The receiver only goes away on shutdown.
            if sender.send(message).is_err() {
                debug!("Event loop gone, dropping result");
            }
        });
    }

    /// Next finished command, if any. Never blocks.
    pub fn try_next(&self) -> Option<Message> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

fn run(service: &dyn DataService, command: Command) -> Message {
    match command {
        Command::Fetch(FetchRequest { token, query }) => {
            let outcome = match query.mode() {
                QueryMode::Browse => service.list_page(query.page_number(), query.page_size()),
                QueryMode::Search => service.search_page(
                    query.search_text(),
                    query.page_number(),
                    query.page_size(),
                ),
            };
            Message::FetchCompleted { token, outcome }
        }
        Command::Upload(candidate) => Message::UploadCompleted(service.upload(&candidate)),
        Command::Clear => Message::ClearCompleted(service.clear()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::FetchOrchestrator;
    use crate::query::QueryModel;
    use crate::service::{DatasetDescriptor, PageResult, ServiceError};
    use crate::state::ViewState;
    use crate::upload::UploadCandidate;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
    }

    impl DataService for RecordingService {
        fn upload(&self, file: &UploadCandidate) -> Result<DatasetDescriptor, ServiceError> {
            self.calls.lock().unwrap().push(format!("upload {}", file.file_name));
            Ok(DatasetDescriptor {
                headers: file.headers.clone(),
                row_count: 3,
            })
        }

        fn list_page(&self, page: u64, page_size: u64) -> Result<PageResult, ServiceError> {
            self.calls.lock().unwrap().push(format!("list {page} {page_size}"));
            Ok(PageResult::empty())
        }

        fn search_page(
            &self,
            query_text: &str,
            page: u64,
            page_size: u64,
        ) -> Result<PageResult, ServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("search {query_text} {page} {page_size}"));
            Ok(PageResult::empty())
        }

        fn clear(&self) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push("clear".to_string());
            Err(ServiceError::Status {
                status: 500,
                message: "Failed to clear data".into(),
            })
        }
    }

    fn wait_for(executor: &Executor) -> Message {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(message) = executor.try_next() {
                return message;
            }
            assert!(Instant::now() < deadline, "worker did not answer");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn query_mode_selects_operation() {
        let service = Arc::new(RecordingService::default());
        let executor = Executor::new(service.clone(), 1).unwrap();
        let mut orch = FetchOrchestrator::new();
        let mut view = ViewState::new();

        let browse = orch.submit(&mut view, QueryModel::initial().with_page(2));
        executor.execute(Command::Fetch(browse.clone()));
        match wait_for(&executor) {
            Message::FetchCompleted { token, outcome } => {
                assert_eq!(token, browse.token);
                assert!(outcome.is_ok());
            }
            other => panic!("unexpected {other:?}"),
        }

        let search = orch.submit(&mut view, QueryModel::initial().with_search_text("alice"));
        executor.execute(Command::Fetch(search));
        wait_for(&executor);

        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["list 2 50".to_string(), "search alice 1 50".to_string()]
        );
    }

    #[test]
    fn lifecycle_commands_report_back() {
        let service = Arc::new(RecordingService::default());
        let executor = Executor::new(service, 2).unwrap();

        executor.execute(Command::Clear);
        assert!(matches!(
            wait_for(&executor),
            Message::ClearCompleted(Err(ServiceError::Status { status: 500, .. }))
        ));

        executor.execute(Command::Upload(UploadCandidate {
            path: "people.csv".into(),
            file_name: "people.csv".into(),
            file_size: 10,
            headers: vec!["name".into()],
        }));
        match wait_for(&executor) {
            Message::UploadCompleted(Ok(d)) => assert_eq!(d.headers, vec!["name"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
