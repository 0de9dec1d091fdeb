//! Unit tests for strata-synth

use std::io;
use std::path::Path;

use strata_core::*;
use strata_store::SymbolStore;
use tempfile::TempDir;

use crate::*;

fn store_with(drafts: Vec<SymbolDraft>) -> SymbolStore {
    let store = SymbolStore::open_in_memory().unwrap();
    for draft in drafts {
        store.register(draft).unwrap();
    }
    store
}

fn ts(id: &str, namespace: &str, name: &str) -> SymbolDraft {
    SymbolDraft::new(namespace, name).with_id(id)
}

fn cart_registry() -> SymbolStore {
    store_with(vec![
        ts("base", "core", "BaseModel"),
        ts("priced", "shop", "Priced").with_kind(SymbolKind::Interface),
        ts("line", "shop/lines", "LineItem"),
        ts("pricing", "shop", "PricingService").with_kind(SymbolKind::Service),
        ts("cart", "shop", "Cart")
            .with_description("A shopping cart")
            .extending("base")
            .implementing("priced")
            .composing("line", "lines", Multiplicity::ZeroOrMore)
            .depends_on("pricing"),
    ])
}

/// Fails every write beneath a `broken` directory.
struct FlakyFs;

impl FlakyFs {
    fn check(path: &Path) -> io::Result<()> {
        if path.components().any(|c| c.as_os_str() == "broken") {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
        } else {
            Ok(())
        }
    }
}

impl FileSystem for FlakyFs {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        Self::check(path)?;
        LocalFs.write(path, contents)
    }

    fn write_new(&self, path: &Path, contents: &str) -> io::Result<bool> {
        Self::check(path)?;
        LocalFs.write_new(path, contents)
    }

    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        LocalFs.read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        Self::check(path)?;
        LocalFs.create_dir_all(path)
    }
}

#[test]
fn test_generate_is_idempotent() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());
    let id = SymbolId::from("cart");

    let first = synth.generate(&id, &options).unwrap();
    assert!(first.user_file_created);
    assert!(first.generated_written);
    assert_eq!(first.generated_path, out.path().join("shop").join("cart.generated.ts"));
    assert_eq!(first.implementation_path, out.path().join("shop").join("cart.ts"));
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);

    let second = synth.generate(&id, &options).unwrap();
    assert_eq!(second.content_hash, first.content_hash);
    assert!(!second.user_file_created);

    let on_disk = std::fs::read_to_string(&first.generated_path).unwrap();
    assert_eq!(content_hash(&on_disk), first.content_hash);
}

#[test]
fn test_user_edits_survive_regeneration() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());
    let id = SymbolId::from("cart");

    let first = synth.generate(&id, &options).unwrap();
    std::fs::write(&first.implementation_path, "// hand written\n").unwrap();

    let again = synth.generate(&id, &options).unwrap();
    assert!(!again.user_file_created);
    assert_eq!(
        std::fs::read_to_string(&first.implementation_path).unwrap(),
        "// hand written\n"
    );
}

#[test]
fn test_preview_has_no_side_effects() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path().join("gen"));
    let id = SymbolId::from("cart");

    let preview = synth.preview(&id, &options).unwrap();
    let again = synth.preview(&id, &options).unwrap();
    assert_eq!(preview, again);
    assert!(!preview.implementation_exists);
    assert!(!out.path().join("gen").exists());

    let result = synth.generate(&id, &options).unwrap();
    assert_eq!(result.content_hash, preview.content_hash);
    assert_eq!(
        std::fs::read_to_string(&result.generated_path).unwrap(),
        preview.generated_content
    );
    assert_eq!(
        std::fs::read_to_string(&result.implementation_path).unwrap(),
        preview.implementation_stub
    );
    assert!(synth.preview(&id, &options).unwrap().implementation_exists);
}

#[test]
fn test_typescript_rendering() {
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let preview = synth.preview(&"cart".into(), &GenerationOptions::new("out")).unwrap();
    let code = &preview.generated_content;

    assert!(code.starts_with("// Code generated by strata from symbol \"cart\" (shop/Cart v0.1.0). DO NOT EDIT.\n"));
    assert!(code.contains("import { BaseModel } from \"../core/base-model\";\n"));
    assert!(code.contains("import type { LineItem } from \"./lines/line-item\";\n"));
    assert!(code.contains("import type { Priced } from \"./priced\";\n"));
    assert!(code.contains("import type { PricingService } from \"./pricing-service\";\n"));
    assert!(code.contains(" * A shopping cart\n"));
    assert!(code.contains("export abstract class CartBase extends BaseModel implements Priced {\n"));
    assert!(code.contains("  static readonly symbolId = \"cart\";\n"));
    assert!(code.contains("  protected lines!: LineItem[];\n"));
    assert!(code.contains("  protected pricing!: PricingService;\n"));

    let stub = &preview.implementation_stub;
    assert!(stub.contains("import { CartBase } from \"./cart.generated\";\n"));
    assert!(stub.contains("export class Cart extends CartBase {\n}\n"));
}

#[test]
fn test_rust_rendering_and_paths() {
    let store = store_with(vec![
        ts("cart", "shop", "Cart"),
        ts("checkout", "shop/checkout", "CheckoutService")
            .with_language("rust")
            .depends_on("cart")
            .containing("cart"),
    ]);
    let synth = CodeSynthesizer::new(&store);
    let preview = synth.preview(&"checkout".into(), &GenerationOptions::new("out")).unwrap();

    assert_eq!(
        preview.generated_path,
        Path::new("out/shop/checkout/checkout_service_generated.rs")
    );
    assert_eq!(preview.implementation_path, Path::new("out/shop/checkout/checkout_service.rs"));

    let code = &preview.generated_content;
    assert!(code.contains("use crate::shop::cart::Cart;\nuse std::sync::Arc;\n"));
    assert!(code.contains("pub const SYMBOL_ID: &str = \"checkout\";\n"));
    assert!(code.contains("pub const CONTAINS: &[&str] = &[\"cart\"];\n"));
    assert!(code.contains("pub struct CheckoutServiceParts {\n"));
    assert!(code.contains("    pub cart: Arc<Cart>,\n"));
    assert!(code.contains("pub trait CheckoutServiceBase {\n    fn parts(&self) -> &CheckoutServiceParts;\n}\n"));
    assert!(preview
        .implementation_stub
        .contains("use super::checkout_service_generated::{CheckoutServiceBase, CheckoutServiceParts};\n"));
}

#[test]
fn test_python_rendering() {
    let store = store_with(vec![
        ts("cust", "crm", "Customer").with_language("python"),
        ts("order", "shop", "Order")
            .with_language("python")
            .aggregating("cust", "customer", Multiplicity::ZeroOrOne),
    ]);
    let synth = CodeSynthesizer::new(&store);
    let preview = synth.preview(&"order".into(), &GenerationOptions::new("out")).unwrap();

    assert_eq!(preview.generated_path, Path::new("out/shop/order_generated.py"));
    let code = &preview.generated_content;
    assert!(code.contains("from ..crm.customer import Customer\n"));
    assert!(code.contains("class OrderBase(ABC):\n"));
    assert!(code.contains("    SYMBOL_ID: ClassVar[str] = \"order\"\n"));
    assert!(code.contains("    customer: Customer | None\n"));
    assert!(preview.implementation_stub.contains("class Order(OrderBase):\n    pass\n"));
}

#[test]
fn test_docs_can_be_left_out() {
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions {
        include_docs: false,
        ..GenerationOptions::new("out")
    };
    let with_docs = synth.preview(&"cart".into(), &GenerationOptions::new("out")).unwrap();
    let without = synth.preview(&"cart".into(), &options).unwrap();
    assert!(!without.generated_content.contains("A shopping cart"));
    assert!(!without.generated_content.contains("/**"));
    assert_ne!(with_docs.content_hash, without.content_hash);
}

#[test]
fn test_unresolved_reference_is_rendered_by_id() {
    let store = store_with(vec![ts("svc", "app", "Service").depends_on("ghost-dep")]);
    let synth = CodeSynthesizer::new(&store);
    let preview = synth.preview(&"svc".into(), &GenerationOptions::new("out")).unwrap();
    assert_eq!(preview.warnings.len(), 1);
    assert!(preview.warnings[0].contains("ghost-dep"));
    assert!(preview.generated_content.contains("  protected ghostDep!: GhostDep;\n"));
    assert!(!preview.generated_content.contains("import"));
}

#[test]
fn test_overwrite_off_leaves_generated_file() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let id = SymbolId::from("cart");
    let first = synth.generate(&id, &GenerationOptions::new(out.path())).unwrap();
    let stale = std::fs::read_to_string(&first.generated_path).unwrap() + "// local tweak\n";
    std::fs::write(&first.generated_path, &stale).unwrap();

    let options = GenerationOptions {
        overwrite_generated: false,
        ..GenerationOptions::new(out.path())
    };
    let second = synth.generate(&id, &options).unwrap();
    assert!(!second.generated_written);
    assert_eq!(second.warnings.len(), 1);
    assert_eq!(std::fs::read_to_string(&first.generated_path).unwrap(), stale);

    let third = synth.generate(&id, &GenerationOptions::new(out.path())).unwrap();
    assert!(third.generated_written);
    assert_eq!(content_hash(&std::fs::read_to_string(&first.generated_path).unwrap()), third.content_hash);
}

#[test]
fn test_eligibility() {
    let store = store_with(vec![
        ts("ok", "app", "Fine"),
        ts("port", "app", "Port").with_kind(SymbolKind::Interface),
        ts("old", "app", "Old").with_status(SymbolStatus::Deprecated),
        ts("cob", "app", "Ledger").with_language("cobol"),
        ts("sym", "app", "***"),
    ]);
    let synth = CodeSynthesizer::new(&store);
    assert!(synth.can_generate(&"ok".into()).unwrap());
    for id in ["port", "old", "cob", "sym", "missing"] {
        assert!(!synth.can_generate(&id.into()).unwrap(), "{id} should be ineligible");
    }
    assert!(matches!(
        synth.eligibility(&"port".into()).unwrap(),
        Eligibility::Ineligible { reason } if reason.contains("interface")
    ));

    let err = synth.generate(&"port".into(), &GenerationOptions::new("out")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = synth.generate(&"missing".into(), &GenerationOptions::new("out")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_generate_all_accounting() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![
        ts("a", "app", "Alpha"),
        ts("port", "app", "Port").with_kind(SymbolKind::Interface),
        ts("old", "app", "Old").with_status(SymbolStatus::Deprecated),
        ts("cob", "app", "Ledger").with_language("cobol"),
        ts("bad", "broken", "Broken"),
    ]);
    let synth = CodeSynthesizer::with_fs(&store, FlakyFs);
    let batch = synth.generate_all(&GenerationOptions::new(out.path())).unwrap();

    assert_eq!(batch.total, 5);
    assert_eq!(batch.succeeded, 1);
    assert_eq!(batch.failed, 1);
    assert_eq!(batch.skipped, 3);
    assert_eq!(batch.total, batch.succeeded + batch.failed + batch.skipped);
    assert_eq!(batch.results.len(), 5);

    match &batch.entry(&"bad".into()).unwrap().outcome {
        BatchOutcome::Failed { message } => assert!(message.contains("read-only volume"), "{message}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(
        batch.entry(&"a".into()).unwrap().outcome,
        BatchOutcome::Succeeded { .. }
    ));
    assert!(out.path().join("app").join("alpha.generated.ts").exists());
}

#[test]
fn test_generate_multiple_reports_missing_ids() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![ts("a", "app", "Alpha"), ts("b", "app", "Beta")]);
    let synth = CodeSynthesizer::new(&store);
    let ids: Vec<SymbolId> = ["b", "nope", "a"].into_iter().map(SymbolId::from).collect();
    let batch = synth.generate_multiple(&ids, &GenerationOptions::new(out.path())).unwrap();

    assert_eq!((batch.total, batch.succeeded, batch.failed, batch.skipped), (3, 2, 1, 0));
    let order: Vec<&str> = batch.results.iter().map(|e| e.symbol_id.as_str()).collect();
    assert_eq!(order, vec!["b", "nope", "a"]);
}

#[test]
fn test_batch_wire_shape() {
    let mut batch = BatchResult::default();
    batch.push(
        "port".into(),
        BatchOutcome::Skipped {
            reason: "interfaces have no generated code".into(),
        },
    );
    let json = serde_json::to_value(&batch).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "total": 1, "succeeded": 0, "failed": 0, "skipped": 1,
            "results": [{"symbolId": "port", "outcome": "skipped", "reason": "interfaces have no generated code"}]
        })
    );
}

#[test]
fn test_unsafe_namespaces_are_config_errors() {
    for ns in ["../escape", "app/../../etc", "/abs", "app/./x", "c:/win"] {
        let err = namespace_segments(ns).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "{ns}");
    }
    assert_eq!(namespace_segments("app//core/").unwrap(), vec!["app", "core"]);
    assert!(namespace_segments("").unwrap().is_empty());

    let store = store_with(vec![ts("x", "../up", "X")]);
    let synth = CodeSynthesizer::new(&store);
    let err = synth.generate(&"x".into(), &GenerationOptions::new("out")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_empty_output_dir_is_config_error() {
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new("");
    assert_eq!(synth.generate(&"cart".into(), &options).unwrap_err().kind(), ErrorKind::Config);
    assert_eq!(synth.generate_all(&options).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn test_has_user_implementation() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let id = SymbolId::from("cart");
    assert!(!synth.has_user_implementation(&id, out.path()).unwrap());
    synth.generate(&id, &GenerationOptions::new(out.path())).unwrap();
    assert!(synth.has_user_implementation(&id, out.path()).unwrap());
    assert!(!synth.has_user_implementation(&"missing".into(), out.path()).unwrap());
}

#[test]
fn test_concurrent_generation_creates_stub_once() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());
    let id = SymbolId::from("cart");

    let results: Vec<GenerationResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| synth.generate(&id, &options).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.user_file_created).count(), 1);
    let hashes: std::collections::BTreeSet<&str> = results.iter().map(|r| r.content_hash.as_str()).collect();
    assert_eq!(hashes.len(), 1);
    assert_eq!(synth.held_locks(), 0);
}

#[test]
fn test_locks_released_after_failure() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![ts("a", "app", "Alpha"), ts("bad", "broken", "Bad")]);
    let synth = CodeSynthesizer::with_fs(&store, FlakyFs);
    let options = GenerationOptions::new(out.path());

    synth.generate(&"a".into(), &options).unwrap();
    assert!(synth.generate(&"bad".into(), &options).is_err());
    assert_eq!(synth.held_locks(), 0);
}

/// `FooGenerated`'s implementation file is `foo_generated.rs`, the same path
/// as `Foo`'s generated file.
#[test]
fn test_generated_file_never_replaces_implementation() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![
        ts("x", "app", "FooGenerated").with_language("rust"),
        ts("y", "app", "Foo").with_language("rust"),
    ]);
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());

    let x = synth.generate(&"x".into(), &options).unwrap();
    assert_eq!(x.implementation_path, out.path().join("app").join("foo_generated.rs"));
    std::fs::write(&x.implementation_path, "pub fn hand_written() {}\n").unwrap();

    let preview = synth.preview(&"y".into(), &options).unwrap();
    assert_eq!(preview.generated_path, x.implementation_path);
    assert!(preview.warnings.iter().any(|w| w.contains("refusing to overwrite")), "{:?}", preview.warnings);

    let err = synth.generate(&"y".into(), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        std::fs::read_to_string(&x.implementation_path).unwrap(),
        "pub fn hand_written() {}\n"
    );
    assert!(!out.path().join("app").join("foo.rs").exists());
}

/// Same two symbols, generated the other way round.
#[test]
fn test_implementation_never_adopts_generated_file() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![
        ts("x", "app", "FooGenerated").with_language("rust"),
        ts("y", "app", "Foo").with_language("rust"),
    ]);
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());

    let y = synth.generate(&"y".into(), &options).unwrap();
    let before = std::fs::read_to_string(&y.generated_path).unwrap();

    let err = synth.generate(&"x".into(), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(!out.path().join("app").join("foo_generated_generated.rs").exists());
    assert_eq!(std::fs::read_to_string(&y.generated_path).unwrap(), before);

    let batch = synth.generate_all(&options).unwrap();
    assert_eq!(batch.succeeded, 1);
    assert_eq!(batch.failed, 1);
    assert!(matches!(batch.entry(&"x".into()).unwrap().outcome, BatchOutcome::Failed { .. }));
}

#[test]
fn test_names_with_one_stem_do_not_share_files() {
    let out = TempDir::new().unwrap();
    let store = store_with(vec![ts("upper", "shop", "Cart"), ts("lower", "shop", "cart")]);
    let synth = CodeSynthesizer::new(&store);
    let options = GenerationOptions::new(out.path());

    let first = synth.generate(&"upper".into(), &options).unwrap();
    let err = synth.generate(&"lower".into(), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let on_disk = std::fs::read_to_string(&first.generated_path).unwrap();
    assert_eq!(content_hash(&on_disk), first.content_hash);
    assert!(synth.generate(&"upper".into(), &options).is_ok());
}

#[test]
fn test_foreign_file_at_generated_path_is_kept() {
    let out = TempDir::new().unwrap();
    let store = cart_registry();
    let synth = CodeSynthesizer::new(&store);
    let dir = out.path().join("shop");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("cart.generated.ts"), "export const mine = 1;\n").unwrap();

    let err = synth.generate(&"cart".into(), &GenerationOptions::new(out.path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        std::fs::read_to_string(dir.join("cart.generated.ts")).unwrap(),
        "export const mine = 1;\n"
    );
    assert!(!dir.join("cart.ts").exists());
}
