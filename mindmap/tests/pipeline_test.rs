//! End-to-end tests: provider outline to built map, persisted and reloaded.

use std::path::PathBuf;
use std::sync::Arc;

use notemap_mindmap::{
    MindmapConfig, MindmapPipeline, MindmapStats, MindmapStore, OutlineSerializer, SaveOptions,
    SourceContent, StaticOutlineProvider, TagOutlineProvider, TagWeighting, Warning,
    category_summaries, tag_summaries,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sources() -> Vec<SourceContent> {
    vec![
        SourceContent::new("ai.md")
            .with_tags(["technological/ai"])
            .with_text_len(1200),
        SourceContent::new("quantum.md")
            .with_tags(["deeptech/quantum-ai", "  "])
            .with_text_len(800),
        SourceContent::new("markets.md")
            .with_tags(["economic/markets"])
            .with_text_len(450),
    ]
}

fn pipeline(storage: &std::path::Path) -> MindmapPipeline {
    let text = std::fs::read_to_string(fixtures_dir().join("steeple_outline.json")).unwrap();
    let config = MindmapConfig::new(storage)
        .with_categories(["Technological", "Economic", "DeepTech"])
        .with_weighting(TagWeighting::High)
        .with_metadata_backup(true);
    MindmapPipeline::new(config, Arc::new(StaticOutlineProvider::from_json(&text).unwrap()))
}

#[tokio::test]
async fn test_generate_from_model_outline() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let output = pipeline(temp_dir.path()).generate(&sources()).await.unwrap();
    let map = &output.mindmap;

    let titles: Vec<&str> = map.root.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Technological", "Economic", "Quantum Startups"]);
    let categories: Vec<&str> = map
        .root
        .children
        .iter()
        .filter_map(|c| c.category.as_deref())
        .collect();
    assert_eq!(categories, vec!["Technological", "Economic", "DeepTech"]);

    // The untitled entry's child is hoisted into Economic.
    let economic: Vec<&str> = map.root.children[1]
        .children
        .iter()
        .map(|c| c.title.as_str())
        .collect();
    assert_eq!(economic, vec!["Market Shift", "Compute Costs"]);

    assert_eq!(output.links.added, 1);
    assert_eq!(map.secondary_links(), vec![("0.0".to_string(), "1.1".to_string())]);

    assert!(output.warnings.iter().any(|w| matches!(w, Warning::TagDropped { .. })));
    assert!(output
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::UntitledEntry { hoisted_children: 1 })));
    let unattributed: Vec<&str> = output
        .warnings
        .iter()
        .filter_map(|w| match w {
            Warning::UnattributedNode { title } => Some(title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unattributed, vec!["Model Scaling", "Alignment", "Funding Rounds"]);
}

#[tokio::test]
async fn test_generated_map_survives_store() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let pipeline = pipeline(temp_dir.path());
    let map = pipeline.generate(&sources()).await.unwrap().mindmap;

    let store = MindmapStore::from_config(pipeline.config());
    store
        .save(
            &map,
            SaveOptions {
                metadata_backup: pipeline.config().metadata_backup,
            },
        )
        .unwrap();
    assert_eq!(store.list().unwrap(), vec![map.id.clone()]);

    let loaded = store.load(&map.id).unwrap();
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    let loaded = loaded.mindmap;
    assert_eq!(loaded.root, map.root);
    assert_eq!(loaded.category_schema, map.category_schema);
    assert_eq!(loaded.source_files, map.source_files);
    assert_eq!(loaded.created_at, map.created_at);

    let outline = std::fs::read_to_string(temp_dir.path().join(format!("{}.md", map.id))).unwrap();
    assert_eq!(outline, OutlineSerializer::new().render(&map));
}

#[tokio::test]
async fn test_summaries_of_generated_map() {
    let temp_dir = TempDir::new().unwrap();
    let map = pipeline(temp_dir.path())
        .generate(&sources())
        .await
        .unwrap()
        .mindmap;

    let stats = MindmapStats::from_mindmap(&map);
    assert_eq!(stats.categories, 3);
    assert_eq!(stats.total_nodes, 10);
    assert_eq!(stats.max_depth, 3);
    assert_eq!(stats.secondary_links, 1);
    assert_eq!(stats.unattributed, 3);
    assert_eq!(stats.source_files, 3);

    let summaries = category_summaries(&map);
    assert_eq!(summaries[0].category, "Technological");
    assert_eq!(
        summaries[0].sources,
        vec!["ai.md".to_string(), "quantum.md".to_string()]
    );
    assert_eq!(summaries[2].category, "DeepTech");
    assert_eq!(summaries[2].nodes, 2);

    let tags = tag_summaries(&map);
    assert_eq!(tags[0].tag, "technological/ai");
    assert_eq!(tags[0].count, 3);
}

#[test]
fn test_tag_only_pipeline_combines_batches() {
    init_tracing();
    let config = MindmapConfig::new("/tmp/unused")
        .with_categories(["Technological", "Economic", "DeepTech"])
        .with_weighting(TagWeighting::High);
    let pipeline = MindmapPipeline::new(config, Arc::new(TagOutlineProvider));

    let batches = vec![
        vec![SourceContent::new("ai.md").with_tags(["technological/ai/agents"])],
        vec![
            SourceContent::new("ai2.md").with_tags(["Technological/AI"]),
            SourceContent::new("m.md").with_tags(["economic/markets"]),
        ],
    ];
    let combined = tokio_test::block_on(pipeline.generate_combined(&batches)).unwrap();
    let map = &combined.mindmap;

    let titles: Vec<&str> = map.root.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Technological", "Economic", "DeepTech"]);

    let tech = map.category_node("Technological").unwrap();
    assert_eq!(tech.children.len(), 1);
    assert_eq!(tech.children[0].title, "ai");
    assert_eq!(
        tech.children[0].source_refs,
        vec!["ai.md".to_string(), "ai2.md".to_string()]
    );
    assert_eq!(tech.children[0].children[0].title, "agents");
    assert!(map.category_node("DeepTech").unwrap().children.is_empty());
}
