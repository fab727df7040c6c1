use std::sync::Arc;

use cdrs_tokio_proxy::cluster::topology::ProxyTopologyTracker;
use cdrs_tokio_proxy::cluster::{ProxyConnectionConfigBuilder, ProxySessionBuilder};
use cdrs_tokio_proxy::compression::Compression;
use cdrs_tokio_proxy::consistency::Consistency;
use cdrs_tokio_proxy::query::QueryValues;
use cdrs_tokio_proxy::retry::ExponentialReconnectionPolicy;
use cdrs_tokio_proxy::statement::StatementParamsBuilder;
use cdrs_tokio_proxy::transport::TcpConnector;

#[tokio::main]
async fn main() {
    let config = ProxyConnectionConfigBuilder::new("127.0.0.1:9042".into())
        .with_compression(Compression::Lz4)
        .build()
        .await
        .unwrap();
    let connector = TcpConnector::from_config(&config);
    let tracker = Arc::new(ProxyTopologyTracker::new(
        config.addr(),
        connector,
        Arc::new(ExponentialReconnectionPolicy::default()),
    ));

    let session = ProxySessionBuilder::new(config, connector)
        .with_topology_tracker(tracker.clone())
        .with_host_events(tracker.subscribe())
        .with_default_consistency(Consistency::LocalQuorum)
        .build()
        .await
        .expect("connect error");

    // no routing key - the proxy picks the shard
    session
        .query("CREATE KEYSPACE IF NOT EXISTS test_ks WITH REPLICATION = { 'class' : 'SimpleStrategy', 'replication_factor' : 1 };")
        .await
        .expect("keyspace error");

    let id = session
        .prepare("INSERT INTO test_ks.my_test_table (key, value) VALUES (?, ?)")
        .await
        .expect("prepare error");

    for key in 0..10i32 {
        let routing_key = key.to_be_bytes().to_vec();
        let params = StatementParamsBuilder::new()
            .with_consistency(Consistency::LocalQuorum)
            .with_values(QueryValues::from(vec![routing_key.clone(), b"value".to_vec()]))
            .with_routing_key(routing_key)
            .build();

        session.execute(id.clone(), params).await.expect("execute error");
    }

    println!("proxy host state: {}", tracker.state());
}
