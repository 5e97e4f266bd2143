//! Typed operations over the worker bridge.
//!
//! Each operation validates its input, builds the wire params map, and
//! dispatches through [`IndexService::call`]. Encodings follow the worker's
//! conventions: list parameters travel comma-joined, line numbers as
//! decimal strings.

use serde_json::{Map, Value, json};

use crate::error::BridgeError;
use crate::params::{Role, SearchOption, comma_join, parse_line_number};
use crate::service::IndexService;

impl IndexService {
    /// Ask the worker to load the index for a project and report whether
    /// it is available for queries.
    pub async fn load_index(&self, project_name: &str) -> Result<bool, BridgeError> {
        let mut params = Map::new();
        params.insert("projectName".to_string(), json!(project_name));

        let result = self.call("is_available", params).await?;
        result.as_bool().ok_or_else(|| {
            BridgeError::decode(format!("expected boolean availability, got {result}"))
        })
    }

    /// Occurrences of the symbol at a file position.
    ///
    /// `line_number` arrives as raw JSON so that non-integer input is
    /// rejected here rather than at the transport boundary.
    pub async fn symbol_occurrences(
        &self,
        file_path: &str,
        line_number: &Value,
    ) -> Result<Value, BridgeError> {
        let line = parse_line_number(line_number)?;

        let mut params = Map::new();
        params.insert("filePath".to_string(), json!(file_path));
        params.insert("lineNumber".to_string(), json!(line.to_string()));

        self.call("symbol_occurrences", params).await
    }

    /// Occurrences of a USR, filtered by role.
    ///
    /// Roles always travel on the wire, comma-joined; an empty list sends
    /// an empty string.
    pub async fn get_occurrences(&self, usr: &str, roles: &[String]) -> Result<Value, BridgeError> {
        let roles = Role::parse_list(roles)?;

        let mut params = Map::new();
        params.insert("usr".to_string(), json!(usr));
        params.insert(
            "roles".to_string(),
            json!(comma_join(&roles, |r| r.as_str())),
        );

        self.call("get_occurrences", params).await
    }

    /// Symbols matching a name pattern, with optional search modifiers.
    ///
    /// An absent or empty option list omits the `options` key entirely and
    /// skips option validation, matching the worker's contract.
    pub async fn search_pattern(
        &self,
        pattern: &str,
        options: Option<&[String]>,
    ) -> Result<Value, BridgeError> {
        let mut params = Map::new();
        params.insert("pattern".to_string(), json!(pattern));

        if let Some(options) = options
            && !options.is_empty()
        {
            let options = SearchOption::parse_list(options)?;
            params.insert(
                "options".to_string(),
                json!(comma_join(&options, |o| o.as_str())),
            );
        }

        self.call("search_pattern", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::codec::LineJsonCodec;
    use crate::bridge::protocol::{WireRequest, WireResponse};
    use crate::config::BridgeConfig;
    use crate::error::ErrorKind;
    use crate::supervisor::WorkerSpawner;
    use futures::{SinkExt, StreamExt};
    use std::process::Stdio;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::process::Child;
    use tokio_util::codec::{FramedRead, FramedWrite};

    struct StubSpawner {
        spawned: AtomicUsize,
    }

    impl StubSpawner {
        fn new() -> Self {
            Self {
                spawned: AtomicUsize::new(0),
            }
        }

        fn spawn_count(&self) -> usize {
            self.spawned.load(Ordering::SeqCst)
        }
    }

    impl WorkerSpawner for StubSpawner {
        fn spawn(&self, _config: &BridgeConfig) -> Result<Child, BridgeError> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            let mut cmd = tokio::process::Command::new("sleep");
            cmd.arg("300")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true);
            #[cfg(unix)]
            cmd.process_group(0);
            cmd.spawn().map_err(|e| BridgeError::spawn(e.to_string()))
        }
    }

    fn ok_response(req: &WireRequest, result: Value) -> WireResponse {
        WireResponse {
            id: Some(req.id.to_string()),
            result: Some(result),
            error: None,
        }
    }

    /// Stub worker that records every request it sees.
    async fn recording_worker<F>(seen: Arc<StdMutex<Vec<WireRequest>>>, respond: F) -> String
    where
        F: Fn(&WireRequest) -> WireResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (read_half, write_half) = stream.into_split();
                let mut reader = FramedRead::new(read_half, LineJsonCodec::<WireRequest>::new());
                let mut writer = FramedWrite::new(write_half, LineJsonCodec::<WireResponse>::new());

                while let Some(Ok(req)) = reader.next().await {
                    seen.lock().unwrap().push(req.clone());
                    if writer.send(respond(&req)).await.is_err() {
                        break;
                    }
                }
            }
        });

        addr
    }

    fn stub_config(addr: &str, spawner: Arc<dyn WorkerSpawner>) -> BridgeConfig {
        let (host, port) = addr.rsplit_once(':').unwrap();
        BridgeConfig::new()
            .with_endpoint(host, port.parse().unwrap())
            .with_connect_timeout(Duration::from_millis(500))
            .with_ready_deadline(Duration::from_secs(5))
            .with_exchange_timeout(Duration::from_secs(2))
            .with_stop_grace(Duration::from_millis(200))
            .with_spawner(spawner)
    }

    fn sent_params(seen: &Arc<StdMutex<Vec<WireRequest>>>, index: usize) -> Value {
        let requests = seen.lock().unwrap();
        serde_json::to_value(&requests[index].params).unwrap()
    }

    #[tokio::test]
    async fn invalid_roles_are_rejected_before_dispatch() {
        let spawner = Arc::new(StubSpawner::new());
        let config = BridgeConfig::new()
            .with_endpoint("127.0.0.1", 1)
            .with_spawner(Arc::clone(&spawner) as _);
        let svc = IndexService::new(config);

        let err = svc
            .get_occurrences("s:14main3fooyyF", &["reference".into(), "declaration".into()])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("declaration"), "{err}");
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_before_dispatch() {
        let spawner = Arc::new(StubSpawner::new());
        let config = BridgeConfig::new()
            .with_endpoint("127.0.0.1", 1)
            .with_spawner(Arc::clone(&spawner) as _);
        let svc = IndexService::new(config);

        let options = vec!["ignoreCase".to_string(), "fuzzy".to_string()];
        let err = svc
            .search_pattern("myFunction", Some(&options))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(err.to_string().contains("fuzzy"), "{err}");
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn bad_line_numbers_are_rejected_before_dispatch() {
        let spawner = Arc::new(StubSpawner::new());
        let config = BridgeConfig::new()
            .with_endpoint("127.0.0.1", 1)
            .with_spawner(Arc::clone(&spawner) as _);
        let svc = IndexService::new(config);

        for line in [json!(0), json!(-3), json!(2.5), json!("7"), json!(null)] {
            let err = svc
                .symbol_occurrences("/src/App.swift", &line)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputValidation, "line: {line}");
        }
        assert_eq!(spawner.spawn_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn load_index_sends_project_name() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let addr = recording_worker(Arc::clone(&seen), |req| ok_response(req, json!(true))).await;
        let svc = IndexService::new(stub_config(&addr, Arc::new(StubSpawner::new())));

        let available = svc.load_index("DemoProject").await.unwrap();
        assert!(available);

        {
            let requests = seen.lock().unwrap();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].method, "is_available");
        }
        assert_eq!(sent_params(&seen, 0), json!({"projectName": "DemoProject"}));

        svc.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn load_index_rejects_non_boolean_result() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let addr = recording_worker(Arc::clone(&seen), |req| ok_response(req, json!("yes"))).await;
        let svc = IndexService::new(stub_config(&addr, Arc::new(StubSpawner::new())));

        let err = svc.load_index("DemoProject").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        svc.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symbol_occurrences_sends_line_number_as_string() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let body = json!({"symbols": [{"name": "viewDidLoad", "line": 42}]});
        let respond_body = body.clone();
        let addr = recording_worker(Arc::clone(&seen), move |req| {
            ok_response(req, respond_body.clone())
        })
        .await;
        let svc = IndexService::new(stub_config(&addr, Arc::new(StubSpawner::new())));

        let result = svc
            .symbol_occurrences("/src/App.swift", &json!(42))
            .await
            .unwrap();
        assert_eq!(result, body);

        assert_eq!(
            sent_params(&seen, 0),
            json!({"filePath": "/src/App.swift", "lineNumber": "42"})
        );

        svc.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn get_occurrences_joins_roles() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let addr =
            recording_worker(Arc::clone(&seen), |req| ok_response(req, json!([]))).await;
        let svc = IndexService::new(stub_config(&addr, Arc::new(StubSpawner::new())));

        svc.get_occurrences(
            "s:14main3fooyyF",
            &["reference".to_string(), "definition".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(
            sent_params(&seen, 0),
            json!({"usr": "s:14main3fooyyF", "roles": "reference,definition"})
        );

        // An empty role list still sends the key.
        svc.get_occurrences("s:14main3fooyyF", &[]).await.unwrap();
        assert_eq!(
            sent_params(&seen, 1),
            json!({"usr": "s:14main3fooyyF", "roles": ""})
        );

        svc.shutdown().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn search_pattern_omits_absent_or_empty_options() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let matches = json!([
            {"name": "myFunction", "usr": "s:14main10myFunctionyyF", "path": "/src/App.swift"}
        ]);
        let respond_body = matches.clone();
        let addr = recording_worker(Arc::clone(&seen), move |req| {
            ok_response(req, respond_body.clone())
        })
        .await;
        let svc = IndexService::new(stub_config(&addr, Arc::new(StubSpawner::new())));

        let result = svc.search_pattern("myFunction", None).await.unwrap();
        assert_eq!(result, matches);
        assert_eq!(sent_params(&seen, 0), json!({"pattern": "myFunction"}));

        svc.search_pattern("myFunction", Some(&[])).await.unwrap();
        assert_eq!(sent_params(&seen, 1), json!({"pattern": "myFunction"}));

        let options = vec!["ignoreCase".to_string(), "subsequence".to_string()];
        let result = svc
            .search_pattern("myFunction", Some(&options))
            .await
            .unwrap();
        assert_eq!(result, matches);
        assert_eq!(
            sent_params(&seen, 2),
            json!({"pattern": "myFunction", "options": "ignoreCase,subsequence"})
        );

        svc.shutdown().await;
    }
}
