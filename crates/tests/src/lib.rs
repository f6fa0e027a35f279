//! # Integration Tests
//!
//! End-to-end scenarios across crates: mock sources through the ingestion
//! pipeline and dispatcher into the broker and the bulk pipeline, with bulk
//! datagrams received on a real local UDP socket.

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_minimal_config_defaults() {
        let config = ConfigLoader::load_from_str(
            "[[sources]]\npath = \"/var/log/app.log\"\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.server.realtime_path, "/v0/logs/all/realtime");
        assert_eq!(config.server.status_path, "/v0/logs");
        assert_eq!(config.bulk.flush_interval_ms, 1000);
        assert_eq!(config.bulk.max_records, 100);
        assert_eq!(config.bulk.max_bytes, 60_000);
        assert_eq!(config.bulk.max_datagram_bytes, 65_000);
        assert_eq!(config.sources[0].source_name(), "/var/log/app.log");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use broker::{BrokerHandle, BrokerService, Subscription};
    use bulk::{BulkPipeline, MemoryTransport, UdpTransport};
    use contracts::{BulkConfig, DispatchConfig, LineMessage, Record, UdpEndpoint};
    use dispatcher::{BroadcastSink, BulkSink, DispatcherBuilder, BULK_SINK, REALTIME_SINK};
    use ingestion::{IngestionPipeline, MockRecordSource, RecordFormatter};
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn message(record: &Record) -> String {
        let msg: LineMessage = serde_json::from_slice(&record.payload).unwrap();
        msg.message
    }

    fn ingestion() -> IngestionPipeline {
        IngestionPipeline::with_formatter(64, RecordFormatter::new("e2e-host"))
    }

    async fn recv_n(subscription: &Subscription, n: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let record = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();
            out.push(message(&record));
        }
        out
    }

    /// Receive datagrams until `expected` documents have arrived.
    async fn receive_documents(socket: &UdpSocket, expected: usize) -> (usize, Vec<String>) {
        let mut buf = vec![0u8; 65_536];
        let mut datagrams = 0;
        let mut messages = Vec::new();
        while messages.len() < expected {
            let (len, _) = timeout(WAIT, socket.recv_from(&mut buf)).await.unwrap().unwrap();
            datagrams += 1;
            for doc in bulk::parse_datagram(&buf[..len]).unwrap() {
                assert!(doc.index.starts_with("logstash-"));
                assert_eq!(doc.doc_type, "message");
                messages.push(doc.document["@message"].as_str().unwrap().to_string());
            }
        }
        (datagrams, messages)
    }

    async fn udp_bulk(config: &BulkConfig) -> (UdpSocket, BulkPipeline) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let endpoint: UdpEndpoint = format!("udp://127.0.0.1:{port}").parse().unwrap();
        let bulk = BulkPipeline::spawn(config, UdpTransport::new(endpoint));
        (socket, bulk)
    }

    fn spawn_broker(capacity: usize) -> (BrokerHandle, tokio::task::JoinHandle<broker::BrokerStats>) {
        BrokerService::spawn(capacity)
    }

    /// Source -> dispatcher -> {broker subscriber, bulk over UDP}
    #[tokio::test]
    async fn test_e2e_both_sinks_receive_every_line_in_order() {
        let (broker, broker_task) = spawn_broker(64);
        let subscriber = broker.subscribe().await;

        let bulk_config = BulkConfig {
            max_records: 5,
            flush_interval_ms: 60_000,
            ..Default::default()
        };
        let (socket, bulk) = udp_bulk(&bulk_config).await;

        let mut ingestion = ingestion();
        let input = ingestion.take_receiver().unwrap();
        let dispatcher = DispatcherBuilder::standard(input, &DispatchConfig::default(), broker.clone(), bulk.sender())
            .build()
            .await
            .unwrap();
        let dispatcher_task = dispatcher.spawn();

        ingestion
            .register(MockRecordSource::numbered("app", "line", 20))
            .unwrap();

        let expected: Vec<String> = (0..20).map(|n| format!("line {n}")).collect();

        assert_eq!(recv_n(&subscriber, 20).await, expected);

        let (datagrams, bulk_messages) = receive_documents(&socket, 20).await;
        assert_eq!(datagrams, 4);
        assert_eq!(bulk_messages, expected);

        // Orderly stop, in data order
        let exit = ingestion.next_exit().await.unwrap();
        assert_eq!(exit.result.unwrap(), 20);
        ingestion.stop_all().await;

        let report = dispatcher_task.await.unwrap().unwrap();
        assert_eq!(report.records, 20);
        assert_eq!(report.sinks[REALTIME_SINK].written, 20);
        assert_eq!(report.sinks[BULK_SINK].written, 20);

        let summary = bulk.shutdown().await.unwrap();
        assert_eq!(summary.batches_committed, 4);
        assert_eq!(summary.records_committed, 20);

        broker.shutdown().unwrap();
        let stats = broker_task.await.unwrap();
        assert_eq!(stats.published, 20);
        assert_eq!(stats.dropped, 0);
        assert!(subscriber.recv().await.is_none());
    }

    /// Shutdown flushes the partial batch that the count threshold never reached.
    #[tokio::test]
    async fn test_e2e_shutdown_flushes_partial_batch() {
        let (broker, broker_task) = spawn_broker(64);
        let (socket, bulk) = udp_bulk(&BulkConfig {
            max_records: 100,
            flush_interval_ms: 60_000,
            ..Default::default()
        })
        .await;

        let mut ingestion = ingestion();
        let input = ingestion.take_receiver().unwrap();
        let task = DispatcherBuilder::standard(input, &DispatchConfig::default(), broker.clone(), bulk.sender())
            .build()
            .await
            .unwrap()
            .spawn();

        ingestion.register(MockRecordSource::numbered("app", "tail", 7)).unwrap();
        ingestion.next_exit().await.unwrap().result.unwrap();
        ingestion.stop_all().await;
        task.await.unwrap().unwrap();

        let summary = bulk.shutdown().await.unwrap();
        assert_eq!(summary.triggers.get("shutdown"), Some(&1));

        let (datagrams, messages) = receive_documents(&socket, 7).await;
        assert_eq!(datagrams, 1);
        assert_eq!(messages.len(), 7);

        broker.shutdown().unwrap();
        broker_task.await.unwrap();
    }

    /// A subscriber that never reads loses the oldest records; others lose nothing.
    #[tokio::test]
    async fn test_e2e_slow_subscriber_isolated() {
        let (broker, broker_task) = spawn_broker(64);
        let fast = broker.subscribe().await;
        let slow = broker.subscribe_with_capacity(4).await;

        let bulk = BulkPipeline::spawn(&BulkConfig::default(), MemoryTransport::new());

        let mut ingestion = ingestion();
        let input = ingestion.take_receiver().unwrap();
        let _task = DispatcherBuilder::standard(input, &DispatchConfig::default(), broker.clone(), bulk.sender())
            .build()
            .await
            .unwrap()
            .spawn();

        ingestion.register(MockRecordSource::numbered("app", "n", 50)).unwrap();

        let received = recv_n(&fast, 50).await;
        assert_eq!(received.last().map(String::as_str), Some("n 49"));

        // Barrier: every publish before this has been offered to all subscribers.
        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.published, 50);
        assert_eq!(stats.dropped, 46);
        assert_eq!(slow.dropped(), 46);

        let kept: Vec<String> = std::iter::from_fn(|| slow.try_recv()).map(|r| message(&r)).collect();
        assert_eq!(kept, vec!["n 46", "n 47", "n 48", "n 49"]);

        broker.shutdown().unwrap();
        broker_task.await.unwrap();
    }

    /// A bulk transport that never completes must not hold up the live feed.
    #[tokio::test]
    async fn test_e2e_stalled_bulk_does_not_stall_broadcast() {
        let (broker, _broker_task) = spawn_broker(256);
        let subscriber = broker.subscribe().await;

        let stalled = MemoryTransport::new().with_delay(Duration::from_secs(3600));
        let bulk = BulkPipeline::spawn(
            &BulkConfig {
                max_records: 1,
                queue_capacity: 2,
                ..Default::default()
            },
            stalled.clone(),
        );

        let mut ingestion = ingestion();
        let input = ingestion.take_receiver().unwrap();
        let dispatcher = DispatcherBuilder::new(input)
            .sink_with_capacity(BroadcastSink::new(REALTIME_SINK, broker.clone()), 1024)
            .sink_with_capacity(BulkSink::new(BULK_SINK, bulk.sender()), 8)
            .build()
            .await
            .unwrap();
        let sinks = dispatcher.sink_metrics();
        let _task = dispatcher.spawn();

        ingestion.register(MockRecordSource::numbered("app", "x", 200)).unwrap();

        let received = recv_n(&subscriber, 200).await;
        assert_eq!(received.len(), 200);
        assert_eq!(stalled.sent_count(), 0);

        let snapshot = sinks.snapshot();
        assert_eq!(snapshot[REALTIME_SINK].dropped, 0);
        assert!(snapshot[BULK_SINK].dropped > 0);
    }

    /// Batches stay within max_bytes plus one frame, and nothing is lost.
    #[tokio::test]
    async fn test_e2e_batches_bounded_by_size() {
        let bulk_config = BulkConfig {
            max_records: 1000,
            max_bytes: 4_000,
            flush_interval_ms: 60_000,
            ..Default::default()
        };
        let (socket, bulk) = udp_bulk(&bulk_config).await;
        let tx = bulk.sender();

        let payload = format!("{{\"@message\":\"{}\"}}", "p".repeat(900));
        let frame_len = {
            let mut buf = Vec::new();
            bulk::write_frame(&mut buf, &Record::new("app", "h", payload.clone())).unwrap();
            buf.len()
        };

        for _ in 0..30 {
            tx.send(Record::new("app", "h", payload.clone())).await.unwrap();
        }
        drop(tx);
        bulk.shutdown().await.unwrap();

        let mut buf = vec![0u8; 65_536];
        let mut documents = 0;
        while documents < 30 {
            let (len, _) = timeout(WAIT, socket.recv_from(&mut buf)).await.unwrap().unwrap();
            assert!(len < bulk_config.max_bytes + frame_len, "datagram of {len} bytes");
            documents += bulk::parse_datagram(&buf[..len]).unwrap().len();
        }
        assert_eq!(documents, 30);
    }

    /// Records cross the broker as the same record the bulk side ships.
    #[tokio::test]
    async fn test_e2e_envelope_fields() {
        let (broker, _broker_task) = spawn_broker(8);
        let subscriber = broker.subscribe().await;
        let bulk = BulkPipeline::spawn(&BulkConfig::default(), MemoryTransport::new());

        let mut ingestion = ingestion();
        let input = ingestion.take_receiver().unwrap();
        let _task = DispatcherBuilder::standard(input, &DispatchConfig::default(), broker.clone(), bulk.sender())
            .build()
            .await
            .unwrap()
            .spawn();

        ingestion
            .register(MockRecordSource::new("web", ["GET /index.html 200"]))
            .unwrap();

        let record = timeout(WAIT, subscriber.recv()).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&record.payload).unwrap();
        assert_eq!(json["@message"], "GET /index.html 200");
        assert_eq!(json["@source_filename"], "web");
        assert_eq!(json["@source_hostname"], "e2e-host");
        assert_eq!(json["@uuid"], record.id.to_string());
        assert!(json["@timestamp"].is_string());
    }
}
