//! End-to-end pipeline test: raw snapshot in, reduced corpus out, token
//! filter with stratified split, manifests at every stage. No network.

use feedmill::{
    config::{OverheadConfig, PipelineConfig, ReduceConfig, SplitConfig},
    corpus::{CorpusFilter, ManifestIndex},
    reduce::reduce_directory,
    tokens::{safe_token_threshold, TokenCounter, Tokenize},
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Word-level tokenizer definition: whitespace pre-tokenization, every
/// unknown word maps to [UNK]. Counts are what matter here, not ids.
fn write_tokenizer(dir: &Path) -> PathBuf {
    let path = dir.join("tokenizer.json");
    let definition = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"[UNK]": 0},
            "unk_token": "[UNK]"
        }
    });
    fs::write(&path, definition.to_string()).unwrap();
    path
}

#[test]
fn config_load_defaults_without_file() {
    let c = PipelineConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.fetch.workers, 16);
    assert_eq!(c.fetch.index_urls.len(), 2);
    assert_eq!(c.filter.max_context_length, 8192);
    assert_eq!(c.filter.overhead.prompt_overhead, 400);
    assert!(!c.filter.split.enabled);
    assert!(c.reduce.keep_to_ids);
}

#[test]
fn token_counter_counts_whitespace_words() {
    let tmp = tempfile::tempdir().unwrap();
    let tokenizer = TokenCounter::from_file(&write_tokenizer(tmp.path())).unwrap();
    assert_eq!(tokenizer.count_tokens("three plain words").unwrap(), 3);
}

#[test]
fn snapshot_reduces_filters_and_splits() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("raw");
    let reduced = tmp.path().join("reduced");
    let filtered = tmp.path().join("filtered");
    fs::create_dir_all(&raw).unwrap();

    // Ten small labeled events, one over the token budget, one Undefined,
    // one unparseable.
    for i in 0..10 {
        let level = ["1", "2"][i % 2];
        fs::write(
            raw.join(format!("ev{i:02}.json")),
            json!({"Event": {
                "date": "2025-08-20",
                "info": format!("campaign {i}"),
                "threat_level_id": level,
                "uuid": "feed-noise",
                "Attribute": [{
                    "type": "filename|md5",
                    "value": format!("payload{i}.exe|0123456789abcdef0123456789abcdef"),
                    "category": "Payload delivery",
                }],
            }})
            .to_string(),
        )
        .unwrap();
    }
    fs::write(
        raw.join("oversized.json"),
        json!({"Event": {
            "info": "w ".repeat(600).trim_end(),
            "threat_level_id": "1",
        }})
        .to_string(),
    )
    .unwrap();
    fs::write(
        raw.join("undefined.json"),
        json!({"Event": {"info": "no label", "threat_level_id": "4"}}).to_string(),
    )
    .unwrap();
    fs::write(raw.join("invalid.json"), "{not json").unwrap();
    // Download manifest overrides ev00's embedded High with Low.
    fs::write(
        raw.join("manifest.jsonl"),
        format!(
            "{}\n",
            json!({"filename": "ev00.json", "threat_level_id": "3", "date": "2025-08-20"})
        ),
    )
    .unwrap();

    let incoming = ManifestIndex::load(&raw.join("manifest.jsonl"));
    let summary = reduce_directory(&raw, &reduced, &incoming, ReduceConfig::default()).unwrap();
    assert_eq!(summary.scanned, 13);
    assert_eq!(summary.written, 12);
    assert_eq!(summary.skipped, 1);

    // Reduction kept the keep-list and masked the composite hash value.
    let doc: Value =
        serde_json::from_slice(&fs::read(reduced.join("ev03.json")).unwrap()).unwrap();
    let attr = &doc["Event"]["Attribute"][0];
    assert_eq!(attr.get("value"), Some(&json!("<md5>")));
    assert_eq!(attr.get("comment"), Some(&json!("")));
    assert!(doc["Event"].get("uuid").is_none());

    let tokenizer = TokenCounter::from_file(&write_tokenizer(tmp.path())).unwrap();
    let threshold = safe_token_threshold(700, &OverheadConfig::default()).unwrap();
    assert_eq!(threshold, 162);

    let split = SplitConfig {
        enabled: true,
        test_size: 0.3,
        seed: 42,
    };
    let filter = CorpusFilter::new(&tokenizer, threshold, split.clone());
    let run = filter.run(&reduced, &filtered).unwrap();

    assert_eq!(run.scanned, 12);
    assert_eq!(run.unlabeled, 1);
    assert_eq!(run.candidates.len(), 11);
    assert_eq!(run.kept.len(), 10);

    // Labels after the manifest override: High x4, Medium x5, Low x1.
    // At test_size 0.3 that splits 1/2/1 to test; the Low singleton rides
    // the at-least-one floor.
    assert_eq!(run.test.len(), 4);
    assert_eq!(run.train.len(), 6);
    assert!(run.test.iter().any(|(f, _)| f == "ev00.json"));

    let kept: HashSet<_> = run.kept.iter().map(|(f, _)| f.as_str()).collect();
    let partitioned: HashSet<_> = run
        .train
        .iter()
        .chain(run.test.iter())
        .map(|(f, _)| f.as_str())
        .collect();
    assert_eq!(kept, partitioned);
    assert!(!kept.contains("oversized.json"));
    assert!(!kept.contains("undefined.json"));

    // Output trees: JSON copies, Markdown twins, manifests everywhere.
    for (filename, _) in run.train.iter() {
        assert!(filtered.join("filtered_json/train").join(filename).is_file());
        let twin = filename.replace(".json", ".md");
        assert!(filtered.join("filtered_md/train").join(twin).is_file());
    }
    for dir in [
        "filtered_json/train",
        "filtered_json/test",
        "filtered_md/train",
        "filtered_md/test",
    ] {
        assert!(filtered.join(dir).join("manifest.jsonl").is_file());
    }
    let root_manifest = fs::read_to_string(filtered.join("filtered_manifest.jsonl")).unwrap();
    assert_eq!(root_manifest.lines().count(), 10);
    let first: Value = serde_json::from_str(root_manifest.lines().next().unwrap()).unwrap();
    assert_eq!(first.get("filename"), Some(&json!("ev00.json")));
    assert_eq!(first.get("threat_level_id"), Some(&json!("3")));
    assert_eq!(first.get("threat_level_label"), Some(&json!("Low")));

    let (train_file, _) = &run.train[0];
    let twin = fs::read_to_string(
        filtered
            .join("filtered_md/train")
            .join(train_file.replace(".json", ".md")),
    )
    .unwrap();
    assert!(twin.starts_with("# Threat Report: 2025-08-20: campaign"));
    assert!(twin.contains("* filename|md5: <md5>"));

    // Same seed, second run: identical partitions.
    let rerun = CorpusFilter::new(&tokenizer, threshold, split)
        .run(&reduced, &tmp.path().join("filtered2"))
        .unwrap();
    assert_eq!(run.train, rerun.train);
    assert_eq!(run.test, rerun.test);
}

#[test]
fn reduction_is_stable_on_its_own_output() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("raw");
    let once = tmp.path().join("once");
    let twice = tmp.path().join("twice");
    fs::create_dir_all(&raw).unwrap();

    let blob: String = "a1".repeat(300);
    fs::write(
        raw.join("event.json"),
        json!({"Event": {
            "info": "stability check",
            "threat_level_id": 2,
            "Attribute": [
                {"type": "sha1", "value": "da39a3ee5e6b4b0d3255bfef95601890afd80709"},
                {"type": "mutex", "value": blob, "to_ids": true},
            ],
        }})
        .to_string(),
    )
    .unwrap();

    let empty = ManifestIndex::load(&raw.join("manifest.jsonl"));
    reduce_directory(&raw, &once, &empty, ReduceConfig::default()).unwrap();
    let first_pass = ManifestIndex::load(&once.join("manifest.jsonl"));
    reduce_directory(&once, &twice, &first_pass, ReduceConfig::default()).unwrap();

    let a = fs::read(once.join("event.json")).unwrap();
    let b = fs::read(twice.join("event.json")).unwrap();
    assert_eq!(a, b);

    // The truncated blob settles at limit + marker and stays there.
    let doc: Value = serde_json::from_slice(&a).unwrap();
    let value = doc["Event"]["Attribute"][1]["value"].as_str().unwrap();
    assert_eq!(value.chars().count(), 513);
    assert!(value.ends_with('…'));
}
