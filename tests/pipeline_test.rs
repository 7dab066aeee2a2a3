//! Component tests: config validation, fetch bounds, encoding, spectral sanitizing,
//! worst-window distance and the circular result buffer.

use flowwave::{
    classify::DistanceClassifier,
    config::{AnalyzerConfig, MAX_INTAKE_BUFFER_SIZE, MAX_RESULT_BUFFER_SIZE},
    error::ConfigError,
    features::{sanitize, weight_transform, SpectralExtractor},
    flow::FlowTable,
    intake::{Fetcher, IntakeBuffer, MetadataSource, PacketMetadata, SharedMetadataQueue},
    record::{FlowRecord, ResultRecorder},
    StructuredLogger,
};
use ndarray::{array, Array2};
use std::net::Ipv4Addr;
use std::sync::Arc;

fn meta(addr: Ipv4Addr, length: u16, ts: f64) -> PacketMetadata {
    PacketMetadata::new(addr, 17, length, ts)
}

#[test]
fn config_defaults_and_unknown_keys() {
    let c = AnalyzerConfig::from_json_str(r#"{"n_fft": 8, "not_an_option": true}"#).unwrap();
    assert_eq!(c.n_fft, 8);
    assert_eq!(c.feature_dim(), 5);
    assert_eq!(c.min_window(), 16);
    assert_eq!(c.mean_win_test, AnalyzerConfig::default().mean_win_test);
    assert!(!c.ip_verbose);
}

#[test]
fn config_accepts_legacy_intake_key() {
    let c = AnalyzerConfig::from_json_str(r#"{"meta_pkt_arr_size": 4096}"#).unwrap();
    assert_eq!(c.intake_buffer_size, 4096);
}

#[test]
fn config_rejects_negative_interval() {
    let err = AnalyzerConfig::from_json_str(r#"{"verbose_interval": -1.0}"#).unwrap_err();
    assert!(matches!(err, ConfigError::NegativeInterval(_)));
    assert!(!err.is_fatal());
}

#[test]
fn config_rejects_invalid_ip_target() {
    let err = AnalyzerConfig::from_json_str(
        r#"{"ip_verbose": true, "verbose_ip_target": "10.0.0.300"}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidIpTarget(_)));

    let c = AnalyzerConfig::from_json_str(
        r#"{"ip_verbose": true, "verbose_ip_target": "10.0.0.1"}"#,
    )
    .unwrap();
    assert_eq!(c.ip_target(), Some(Ipv4Addr::new(10, 0, 0, 1)));
}

#[test]
fn oversized_critical_buffers_are_fatal() {
    let json = serde_json::json!({ "intake_buffer_size": MAX_INTAKE_BUFFER_SIZE + 1 });
    let err = AnalyzerConfig::from_json(&json).unwrap_err();
    assert!(err.is_fatal());

    let json = serde_json::json!({ "result_buffer_size": MAX_RESULT_BUFFER_SIZE + 1 });
    assert!(AnalyzerConfig::from_json(&json).unwrap_err().is_fatal());
}

#[test]
fn config_rejects_fft_larger_than_intake() {
    let err = AnalyzerConfig::from_json_str(r#"{"n_fft": 18446744073709551615}"#).unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { name: "n_fft", .. }));
    assert!(!err.is_fatal());

    let err = AnalyzerConfig::from_json_str(r#"{"intake_buffer_size": 64, "n_fft": 65}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange {
            name: "n_fft",
            value: 65,
            max: 64
        }
    ));
    assert!(AnalyzerConfig::from_json_str(r#"{"intake_buffer_size": 64, "n_fft": 64}"#).is_ok());
}

#[test]
fn config_rejects_windows_larger_than_intake() {
    let err =
        AnalyzerConfig::from_json_str(r#"{"intake_buffer_size": 4096, "mean_win_train": 5000}"#)
            .unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { name: "mean_win_train", .. }));

    let err =
        AnalyzerConfig::from_json_str(r#"{"intake_buffer_size": 4096, "mean_win_test": 5000}"#)
            .unwrap_err();
    assert!(matches!(err, ConfigError::OutOfRange { name: "mean_win_test", .. }));
}

#[test]
fn config_rejects_zero_max_fetch() {
    let err = AnalyzerConfig::from_json_str(r#"{"max_fetch": 0}"#).unwrap_err();
    assert!(matches!(err, ConfigError::ZeroParameter("max_fetch")));
}

#[test]
fn min_window_saturates_on_unvalidated_fft() {
    let c = AnalyzerConfig {
        n_fft: usize::MAX,
        ..AnalyzerConfig::default()
    };
    assert_eq!(c.min_window(), usize::MAX);
}

#[test]
fn config_load_missing_file_fails() {
    let err = AnalyzerConfig::load(std::path::Path::new("nonexistent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn config_result_path() {
    let c = AnalyzerConfig {
        save_dir: "/tmp/results".into(),
        save_file_prefix: "wave".to_string(),
        ..AnalyzerConfig::default()
    };
    assert_eq!(c.result_path(7), std::path::PathBuf::from("/tmp/results/wave_7.json"));
}

#[test]
fn fetch_never_exceeds_intake_capacity() {
    let a: Arc<dyn MetadataSource> = Arc::new(SharedMetadataQueue::new("a", 4096));
    let b = Arc::new(SharedMetadataQueue::new("b", 4096));
    let batch: Vec<_> = (0..1000)
        .map(|i| meta(Ipv4Addr::new(1, 2, 3, 4), 100, 1.0 + i as f64))
        .collect();
    b.publish(&batch);
    let sources = vec![a.clone(), b.clone() as Arc<dyn MetadataSource>];
    a.lock().extend_from_slice(&batch);

    let mut buf = IntakeBuffer::allocate(300).unwrap();
    let fetcher = Fetcher::new(0, 128, 50);
    let mut total = 0;
    for _ in 0..10 {
        total += fetcher.fetch_all(&sources, &mut buf);
        assert!(buf.len() <= buf.capacity());
    }
    assert_eq!(total, 300);
    assert_eq!(a.lock().pending_count() + b.pending_count(), 2000 - 300);
}

#[test]
fn aggregation_resets_intake_and_counts_bytes() {
    let q = SharedMetadataQueue::new("a", 64);
    q.publish(&[
        meta(Ipv4Addr::new(10, 0, 0, 1), 100, 1.0),
        meta(Ipv4Addr::new(10, 0, 0, 2), 200, 1.1),
        meta(Ipv4Addr::new(10, 0, 0, 1), 300, 1.2),
    ]);
    let mut buf = IntakeBuffer::allocate(64).unwrap();
    Fetcher::new(0, 64, 1).fetch_from(&q, &mut buf);

    let mut flows = FlowTable::new(2);
    let stats = flows.aggregate(&mut buf);
    assert_eq!(stats.packets, 3);
    assert_eq!(stats.bytes, 600);
    assert!(buf.is_empty());
    assert_eq!(flows.len(), 2);
    assert_eq!(flows.eligible(), vec![0x0A00_0001]);

    let window = flows.take(0x0A00_0001).unwrap();
    assert_eq!(window.ipv4(), Ipv4Addr::new(10, 0, 0, 1));
    assert_eq!(window.packets.iter().map(|p| p.length).collect::<Vec<_>>(), vec![100, 300]);
    assert!(!flows.is_eligible(0x0A00_0002));
}

#[test]
fn weight_transform_matches_formula() {
    let m = PacketMetadata::new(Ipv4Addr::new(10, 0, 0, 1), 6, 100, 1.0);
    assert_eq!(weight_transform(&m), 1000.6);

    let m = PacketMetadata::new(Ipv4Addr::new(10, 0, 0, 1), 17, 60, 4.0);
    assert!((weight_transform(&m) - (600.0 + 1.7 - 2.0 * 15.68)).abs() < 1e-9);
}

#[test]
fn sanitize_zeroes_only_non_finite() {
    let mut frames = array![[1.0, f64::NAN, 3.0], [f64::INFINITY, 5.0, f64::NEG_INFINITY]];
    sanitize(&mut frames);
    assert_eq!(frames, array![[1.0, 0.0, 3.0], [0.0, 5.0, 0.0]]);
}

#[test]
fn zero_timestamp_yields_finite_frames() {
    let ex = SpectralExtractor::new(4);
    let packets: Vec<_> = (0..8)
        .map(|i| meta(Ipv4Addr::new(10, 0, 0, 1), 60, i as f64 * 0.5))
        .collect();
    let frames = ex.extract(&packets);
    assert_eq!(frames.dim(), (5, 3));
    assert!(frames.iter().all(|v| v.is_finite()));
}

#[test]
fn worst_window_distance_wins() {
    let c = DistanceClassifier::new(Arc::new(array![[0.0, 0.0]]), 1, 1e10);
    // windows [2,0] and [5,0]; the trailing frame is not a full window
    let frames = array![[2.0, 0.0], [5.0, 0.0], [0.0, 0.0]];
    assert_eq!(c.distance(&frames), 5.0);
}

#[test]
fn short_flow_uses_overall_mean() {
    let c = DistanceClassifier::new(Arc::new(array![[0.0, 0.0], [10.0, 0.0]]), 4, 1e10);
    let frames = array![[2.0, 0.0], [4.0, 0.0]];
    assert_eq!(c.distance(&frames), 3.0);
}

#[test]
fn ceiling_caps_distance() {
    let c = DistanceClassifier::new(Arc::new(array![[100.0, 0.0]]), 4, 7.5);
    assert_eq!(c.distance(&Array2::zeros((2, 2))), 7.5);
}

#[test]
fn result_buffer_wraps() {
    let mut rec = ResultRecorder::allocate(8).unwrap();
    for i in 0..13u32 {
        rec.record(FlowRecord {
            address: i,
            distance: f64::from(i),
            packet_count: 1,
        });
    }
    assert_eq!(rec.total(), 13);
    assert_eq!(rec.len(), 8);
    let order: Vec<u32> = rec.chronological().map(|r| r.address).collect();
    assert_eq!(order, (5..13).collect::<Vec<_>>());
    assert!(rec.records().iter().all(|r| r.address >= 5));
}

#[test]
fn save_fails_when_output_cannot_be_created() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();

    let mut rec = ResultRecorder::allocate(4).unwrap();
    rec.record(FlowRecord {
        address: 1,
        distance: 0.5,
        packet_count: 9,
    });
    assert!(rec.save_json(&blocker.join("res_0.json")).is_err());
    assert_eq!(rec.len(), 1);

    let ok = dir.path().join("nested").join("res_0.json");
    rec.save_json(&ok).unwrap();
    assert_eq!(
        std::fs::read_to_string(&ok).unwrap(),
        r#"{"Results":[[1,0.5,9]]}"#
    );
}

#[test]
fn logger_init_is_idempotent() {
    StructuredLogger::init(false, "warn");
    assert!(!StructuredLogger::init(true, "info"));
}
