//! Probe and sweep against a local fixture appliance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use preke::{
	ApiEndpoint, DeviceSource, DiscoveryBackend, DiscoveryEvent, DiscoverySession, ManualOutcome, MemoryRegistry,
	SessionOptions, SweepBackend, SweepConfig,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn spawn_appliance() -> SocketAddr {
	let app = Router::new()
		.route(
			"/api/status",
			get(|| async {
				Json(json!({
					"deviceId": "preke-fixture",
					"name": "Fixture Booth",
					"version": "2.4.1",
					"status": "idle",
				}))
			}),
		)
		.route("/plain", get(|| async { "not a status document" }));

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	addr
}

fn config(port: u16) -> SweepConfig {
	SweepConfig {
		port,
		subnets: vec!["127.0.0.0/30".to_string()],
		hostnames: Vec::new(),
		probe_timeout: Duration::from_millis(500),
		..SweepConfig::default()
	}
}

#[tokio::test]
async fn probe_identifies_a_live_appliance() {
	let addr = spawn_appliance().await;
	let backend = SweepBackend::new(config(addr.port())).unwrap();

	let url = format!("http://{addr}/");
	let device = backend.probe(&url).await.unwrap().unwrap();

	assert_eq!(device.id, "preke-fixture");
	assert_eq!(device.name, "Fixture Booth");
	assert_eq!(device.url, format!("http://{addr}"));
	assert_eq!(device.source, DeviceSource::Probe);
	assert_eq!(device.version.as_deref(), Some("2.4.1"));
}

#[tokio::test]
async fn probe_of_a_non_appliance_is_inconclusive() {
	let addr = spawn_appliance().await;
	let backend = SweepBackend::new(SweepConfig {
		status_path: "/plain".to_string(),
		..config(addr.port())
	})
	.unwrap();

	assert!(backend.probe(&format!("http://{addr}")).await.unwrap().is_none());

	let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let dead = closed.local_addr().unwrap();
	drop(closed);
	assert!(backend.probe(&format!("http://{dead}")).await.unwrap().is_none());
}

#[tokio::test]
async fn sweep_reports_progress_devices_and_completion() {
	let addr = spawn_appliance().await;
	let backend = SweepBackend::new(config(addr.port())).unwrap();

	let (tx, mut rx) = mpsc::unbounded_channel();
	let events = backend.events();
	let t = tx.clone();
	let _started = events.on_discovery_started(move || {
		let _ = t.send(DiscoveryEvent::Started);
	});
	let t = tx.clone();
	let _subnet = events.on_scanning_subnet(move |s| {
		let _ = t.send(DiscoveryEvent::ScanningSubnet(s.to_string()));
	});
	let t = tx.clone();
	let _found = events.on_device_discovered(move |d| {
		let _ = t.send(DiscoveryEvent::DeviceFound(d.clone()));
	});
	let t = tx;
	let _complete = events.on_discovery_complete(move |ds| {
		let _ = t.send(DiscoveryEvent::Complete(ds.to_vec()));
	});

	backend.start_discovery().await.unwrap();

	let mut seen = Vec::new();
	tokio::time::timeout(Duration::from_secs(10), async {
		while let Some(event) = rx.recv().await {
			let done = matches!(event, DiscoveryEvent::Complete(_));
			seen.push(event);
			if done {
				break;
			}
		}
	})
	.await
	.expect("sweep did not complete");

	assert_eq!(seen.first(), Some(&DiscoveryEvent::Started));
	assert!(seen.contains(&DiscoveryEvent::ScanningSubnet("127.0.0.0/30".to_string())));

	let found: Vec<_> = seen
		.iter()
		.filter_map(|e| match e {
			DiscoveryEvent::DeviceFound(d) => Some(d.id.as_str()),
			_ => None,
		})
		.collect();
	assert_eq!(found, vec!["preke-fixture"]);

	let Some(DiscoveryEvent::Complete(devices)) = seen.last() else {
		panic!("last event was not completion: {seen:?}");
	};
	assert_eq!(devices.len(), 1);
	assert_eq!(devices[0].url, format!("http://127.0.0.1:{}", addr.port()));
}

#[tokio::test]
async fn manual_entry_through_a_session_uses_the_probe() {
	let addr = spawn_appliance().await;
	let backend = Arc::new(SweepBackend::new(config(addr.port())).unwrap());
	let registry = Arc::new(MemoryRegistry::new());
	let session = DiscoverySession::new(
		backend,
		registry,
		Arc::new(ApiEndpoint::new()),
		SessionOptions::default(),
	);
	session.attach();

	let outcome = session.add_manual(&format!("127.0.0.1:{}", addr.port()), None).await.unwrap();

	let ManualOutcome::Discovered(device) = outcome else {
		panic!("expected the fixture to answer, got {outcome:?}");
	};
	assert_eq!(device.id, "preke-fixture");
	assert_eq!(session.view().discovered.len(), 1);
	session.shutdown().await;
}
