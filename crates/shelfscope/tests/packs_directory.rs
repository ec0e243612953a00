use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use shelfscope::packs::{PackLoad, PackLoader, discover_packs, select_packs};
use shelfscope::render::render_pack;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

#[test]
fn discovery_creates_missing_directory() {
    let dir = unique_temp_dir("shelfscope-packs-create").join("analytics_out/packs");
    assert!(!dir.exists());

    let packs = discover_packs(&dir).expect("discovery should create the directory");
    assert!(packs.is_empty());
    assert!(dir.is_dir());
}

#[test]
fn discovery_lists_json_files_sorted_by_path() {
    let dir = unique_temp_dir("shelfscope-packs-list");
    std::fs::create_dir_all(dir.join("nested.json")).expect("nested dir should be creatable");
    for name in ["weekly.json", "brand_mix.json", "notes.txt", "daily.JSONL"] {
        std::fs::write(dir.join(name), "{}").expect("fixture should be writable");
    }

    let labels = discover_packs(&dir)
        .expect("discovery should succeed")
        .into_iter()
        .map(|pack| pack.label)
        .collect::<Vec<_>>();
    assert_eq!(labels, ["brand_mix", "weekly"]);
}

#[test]
fn broken_pack_degrades_without_hiding_its_neighbours() {
    let dir = unique_temp_dir("shelfscope-packs-mixed");
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    std::fs::write(
        dir.join("a_good.json"),
        r#"{"bullets":["Average discount is 32%"],"kpis":{"sku_count":4},"tables":{}}"#,
    )
    .expect("fixture should be writable");
    std::fs::write(dir.join("b_broken.json"), "{\"bullets\": [").expect("fixture should be writable");
    std::fs::write(dir.join("c_empty.json"), "{}").expect("fixture should be writable");

    let available = discover_packs(&dir).expect("discovery should succeed");
    let requested = ["a_good", "b_broken", "c_empty", "missing"].map(String::from);
    let selection = select_packs(&available, &requested);
    assert_eq!(selection.unknown_labels, ["missing"]);
    assert_eq!(selection.columns, 3);

    let loader = PackLoader::default();
    let loads = selection
        .chosen
        .iter()
        .map(|pack| loader.load(&pack.path))
        .collect::<Vec<_>>();

    assert!(matches!(&loads[0], PackLoad::Ready(pack) if pack.bullets.len() == 1));
    assert!(matches!(&loads[1], PackLoad::Unreadable { .. }));
    assert!(loads[1].pack().is_empty());
    assert!(loads[2].is_blank());

    let good = render_pack("a_good", 0, &loads[0]);
    assert!(good.contains("• Average discount is 32%"), "{good}");
    assert!(good.contains("\"sku_count\": 4"), "{good}");

    let broken = render_pack("b_broken", 1, &loads[1]);
    assert!(broken.starts_with("### b_broken [column 2]\nwarning: Could not read this pack.\n"));
    let empty = render_pack("c_empty", 2, &loads[2]);
    assert_eq!(empty, "### c_empty [column 3]\nwarning: Could not read this pack.\n");
}
