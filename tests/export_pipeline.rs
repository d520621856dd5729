use std::{
    collections::BTreeMap,
    io::{Cursor, Read},
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use c4_image_export::{
    application::{
        catalog::CatalogError,
        export::{ExportError, ExportService, RenderPool},
        render::{DiagramRenderer, RenderError},
    },
    domain::{ImageFormat, ViewCatalog, ViewCategory, ViewDefinition},
    infra::workspace::JsonWorkspaceExtractor,
};
use zip::ZipArchive;

const BIG_BANK: &str = include_str!("fixtures/big_bank.json");

/// Echoes the definition back as the image, failing any view whose source
/// mentions `FAIL`.
fn echo_renderer(calls: Arc<AtomicUsize>) -> Arc<dyn DiagramRenderer> {
    Arc::new(move |definition: &str, format: ImageFormat| {
        calls.fetch_add(1, Ordering::SeqCst);
        if definition.contains("FAIL") {
            return Err(RenderError::malformed("syntax error near FAIL"));
        }
        Ok(format!("{format}:{definition}").into_bytes())
    })
}

fn service_with(renderer: Arc<dyn DiagramRenderer>, timeout: Option<Duration>) -> ExportService {
    ExportService::new(
        RenderPool::new(NonZeroUsize::new(2).expect("non-zero"), timeout),
        renderer,
        Arc::new(JsonWorkspaceExtractor::new()),
    )
}

fn service() -> ExportService {
    service_with(echo_renderer(Arc::new(AtomicUsize::new(0))), None)
}

fn unzip(archive: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).expect("valid zip");
    (0..zip.len())
        .map(|index| {
            let mut entry = zip.by_index(index).expect("entry");
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).expect("read entry");
            (entry.name().to_string(), bytes)
        })
        .collect()
}

fn workspace(name: &str, views: &[(&str, &str)]) -> String {
    let entries: Vec<String> = views
        .iter()
        .map(|(key, definition)| format!(r#"{{"key": "{key}", "definition": "{definition}"}}"#))
        .collect();
    format!(
        r#"{{"name": "{name}", "views": {{"containerViews": [{}]}}}}"#,
        entries.join(",")
    )
}

#[tokio::test]
async fn one_faulting_view_out_of_five_still_exports_the_rest() {
    let report = service()
        .export(BIG_BANK, ImageFormat::Png)
        .await
        .expect("partial export succeeds");

    assert_eq!(report.workspace_name, "Big Bank");
    assert_eq!(report.rendered_count(), 4);
    assert!(report.is_partial());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].category, ViewCategory::Dynamic);
    assert_eq!(report.failures[0].view_key, "SignIn");

    insta::assert_snapshot!(report.entries.join("\n"), @r"
    component_views/Big Bank_Components.png
    container_views/Big Bank_Containers.png
    deployment_views/Big Bank_LiveDeployment.png
    system_context_views/Big Bank_SystemContext.png
    ");

    let archived: Vec<_> = unzip(&report.archive).into_keys().collect();
    assert_eq!(archived, report.entries);
}

#[tokio::test]
async fn archive_holds_renderer_output_verbatim() {
    let report = service()
        .export(&workspace("Shop", &[("Web", "graph TD")]), ImageFormat::Svg)
        .await
        .expect("export");

    let entries = unzip(&report.archive);
    assert_eq!(
        entries.get("container_views/Shop_Web.svg").map(Vec::as_slice),
        Some(b"svg:graph TD".as_slice())
    );
}

#[tokio::test]
async fn every_view_failing_is_a_single_error_without_archive() {
    let document = workspace("Shop", &[("A", "FAIL a"), ("B", "FAIL b"), ("C", "FAIL c")]);

    let err = service()
        .export(&document, ImageFormat::Png)
        .await
        .expect_err("nothing rendered");

    match err {
        ExportError::NoDiagramsRendered { failures } => {
            let mut keys: Vec<_> = failures.iter().map(|f| f.view_key.as_str()).collect();
            keys.sort_unstable();
            assert_eq!(keys, ["A", "B", "C"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn empty_catalog_yields_a_valid_empty_archive() {
    let report = service()
        .export(r#"{"name": "Empty", "views": {}}"#, ImageFormat::Png)
        .await
        .expect("empty export succeeds");

    assert_eq!(report.rendered_count(), 0);
    assert!(!report.is_partial());
    assert!(unzip(&report.archive).is_empty());
}

#[tokio::test]
async fn invalid_documents_fail_before_any_render() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = service_with(echo_renderer(Arc::clone(&calls)), None);

    for document in [
        "",
        "{broken",
        r#"{"workspace":{"name":"Invalid"},"views":[]}"#,
    ] {
        let err = service
            .export(document, ImageFormat::Png)
            .await
            .expect_err("invalid document");
        assert!(
            matches!(err, ExportError::InvalidDocument(_)),
            "unexpected error for {document:?}: {err}"
        );
    }

    let err = service
        .export("   ", ImageFormat::Png)
        .await
        .expect_err("blank document");
    assert!(matches!(
        err,
        ExportError::InvalidDocument(CatalogError::Empty)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_exports_are_identical() {
    let service = service();

    let first = service.export(BIG_BANK, ImageFormat::Pdf).await.expect("first");
    let second = service.export(BIG_BANK, ImageFormat::Pdf).await.expect("second");

    assert_eq!(first.entries, second.entries);
    assert_eq!(first.archive, second.archive);
    assert_ne!(first.export_id, second.export_id);
}

#[tokio::test]
async fn export_catalog_skips_extraction() {
    let mut catalog = ViewCatalog::new("Direct").expect("catalog");
    catalog
        .insert(ViewDefinition::new(ViewCategory::Landscape, "Enterprise", "graph LR").expect("view"))
        .expect("insert");

    let report = service()
        .export_catalog(&catalog, ImageFormat::Png)
        .await
        .expect("export");

    assert_eq!(
        report.entries,
        vec!["system_landscape_views/Direct_Enterprise.png".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exports_share_the_pool_without_mixing_outputs() {
    let service = service();

    let shop = workspace("Shop", &[("Web", "shop web"), ("Db", "shop db")]);
    let bank = workspace("Bank", &[("Core", "bank core"), ("Ledger", "bank ledger")]);

    let (shop_report, bank_report) = tokio::join!(
        service.export(&shop, ImageFormat::Svg),
        service.export(&bank, ImageFormat::Svg)
    );
    let (shop_report, bank_report) = (shop_report.expect("shop"), bank_report.expect("bank"));

    let shop_entries = unzip(&shop_report.archive);
    let bank_entries = unzip(&bank_report.archive);

    assert_eq!(
        shop_entries.keys().collect::<Vec<_>>(),
        ["container_views/Shop_Db.svg", "container_views/Shop_Web.svg"]
    );
    assert_eq!(
        bank_entries.keys().collect::<Vec<_>>(),
        ["container_views/Bank_Core.svg", "container_views/Bank_Ledger.svg"]
    );
    assert!(shop_entries.values().all(|bytes| bytes.starts_with(b"svg:shop")));
    assert!(bank_entries.values().all(|bytes| bytes.starts_with(b"svg:bank")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_view_times_out_and_is_reported() {
    let renderer: Arc<dyn DiagramRenderer> = Arc::new(
        |definition: &str, _format: ImageFormat| -> Result<Vec<u8>, RenderError> {
            if definition == "stall" {
                thread::sleep(Duration::from_millis(500));
            }
            Ok(definition.as_bytes().to_vec())
        },
    );
    let service = service_with(renderer, Some(Duration::from_millis(50)));

    let report = service
        .export(
            &workspace("Shop", &[("Slow", "stall"), ("Quick", "graph TD")]),
            ImageFormat::Png,
        )
        .await
        .expect("export succeeds without the stalled view");

    assert_eq!(report.entries, vec!["container_views/Shop_Quick.png".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].view_key, "Slow");
    assert!(report.failures[0].message.contains("timed out"));
}

#[tokio::test]
async fn closed_pool_fails_the_export() {
    let service = service();
    service.pool().close();

    let err = service
        .export(BIG_BANK, ImageFormat::Png)
        .await
        .expect_err("closed pool");
    assert!(matches!(err, ExportError::Pool(_)));
}
