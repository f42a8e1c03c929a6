use std::{
    env, fs,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use cart_client::{
    CartReconciler, MemoryPage, PageSnapshot, ReconcilerConfig, SaveTransport, Scope,
    SnapshotError, TransportError,
};
use cart_shared::{
    domain::{CartId, Money},
    protocol::SaveResponse,
};
use serde_json::Value;

const DEMO_PAGE: &str = include_str!("../../../demos/cart_page.toml");

struct NeverCalled;

#[async_trait]
impl SaveTransport for NeverCalled {
    async fn post_json(
        &self,
        _path: &str,
        _csrf_token: &str,
        _body: &Value,
    ) -> Result<SaveResponse, TransportError> {
        panic!("totals must not touch the network");
    }
}

#[test]
fn demo_page_parses_and_totals_per_container() {
    let snapshot = PageSnapshot::from_toml_str(DEMO_PAGE).expect("demo page");
    assert_eq!(snapshot.inputs.len(), 3);
    assert_eq!(snapshot.containers.len(), 2);

    let page = Arc::new(MemoryPage::new(snapshot));
    let first = CartReconciler::attach(
        page.clone(),
        Arc::new(NeverCalled),
        ReconcilerConfig::per_container(CartId::new("17")),
    );
    let second = CartReconciler::attach(
        page.clone(),
        Arc::new(NeverCalled),
        ReconcilerConfig::per_container(CartId::new("18")),
    );

    assert_eq!(first.current_total(), Money::from_major(3750));
    assert_eq!(second.current_total(), Money::from_major(135_000));
    assert_eq!(
        page.total_text(&Scope::Container(CartId::new("17"))).as_deref(),
        Some("Total: ₩3,750")
    );
    assert_eq!(
        page.total_text(&Scope::Container(CartId::new("18"))).as_deref(),
        Some("Total: ₩135,000")
    );
}

#[test]
fn snapshot_survives_a_toml_round_trip_after_edits() {
    let page = MemoryPage::new(PageSnapshot::from_toml_str(DEMO_PAGE).expect("demo page"));
    let key = page
        .find_input("data-option-id", "955")
        .expect("demo input");
    page.type_into(key, "7");

    let written = page.snapshot().to_toml_string().expect("encode");
    let reread = PageSnapshot::from_toml_str(&written).expect("decode");

    assert_eq!(reread, page.snapshot());
    assert_eq!(reread.inputs[key.0].value, "7");
}

fn scratch_dir() -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("cart_page_{suffix}"));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

#[test]
fn saved_snapshot_keeps_the_format_of_its_extension() {
    let page = MemoryPage::new(PageSnapshot::from_toml_str(DEMO_PAGE).expect("demo page"));
    let key = page
        .find_input("data-option-id", "955")
        .expect("demo input");
    page.type_into(key, "4");
    let dir = scratch_dir();

    let json_path = dir.join("page.json");
    page.snapshot().save(&json_path).expect("save json");
    let raw = fs::read_to_string(&json_path).expect("read json");
    assert!(serde_json::from_str::<Value>(&raw).is_ok());
    let reloaded = MemoryPage::load(&json_path).expect("reload json");
    assert_eq!(reloaded.snapshot(), page.snapshot());
    assert_eq!(reloaded.input_value(key).as_deref(), Some("4"));

    let toml_path = dir.join("page.toml");
    page.snapshot().save(&toml_path).expect("save toml");
    assert_eq!(
        PageSnapshot::load(&toml_path).expect("reload toml"),
        page.snapshot()
    );

    let other = dir.join("page.yaml");
    assert!(matches!(
        page.snapshot().save(&other),
        Err(SnapshotError::UnknownFormat(_))
    ));
    assert!(!other.exists());

    fs::remove_dir_all(&dir).ok();
}
