//! Projection scenarios over flattened dataset graphs.

use cwr_crate::profile::{
    RO_CRATE_GENERIC, RO_CRATE_PROFILE, WORKFLOW_RO_CRATE_PROFILE, WORKFLOW_RUN_PROFILES,
    WORKFLOW_RUN_TERMS,
};
use cwr_crate::{project, CrateError, EntityKind, FileSource, ProjectOptions, RemoteUrls};
use cwr_jsonld::{FlattenedGraph, RO_CRATE_CONTEXT};
use cwr_types::{ErrorClass, ObjectId};
use serde_json::{json, Value};

const ORCID: &str = "https://orcid.org/0000-0001-9447-460X";

fn graph(nodes: Vec<Value>) -> FlattenedGraph {
    FlattenedGraph {
        context: json!(RO_CRATE_CONTEXT),
        nodes: nodes
            .into_iter()
            .map(|n| n.as_object().unwrap().clone())
            .collect(),
    }
}

fn urls(ids: &[&str]) -> RemoteUrls {
    ids.iter()
        .map(|id| (ObjectId::new(*id), format!("https://example.com/{id}")))
        .collect()
}

fn person() -> Value {
    json!({"@id": "cwr/person", "@type": "Person", "name": "Daniel Bauer", "identifier": ORCID})
}

/// A dataset with two files and an author.
fn plain_dataset() -> FlattenedGraph {
    graph(vec![
        json!({
            "@id": "cwr/ds",
            "@type": "Dataset",
            "name": "Lathyrus vestitus",
            "description": "A test dataset",
            "author": {"@id": "cwr/person"},
            "hasPart": [{"@id": "cwr/f1"}, {"@id": "cwr/f2"}],
            "keywords": ["test1", "test2"],
            "license": {"@id": "https://spdx.org/licenses/CC0-1.0"},
            "datePublished": "2024-11-23T02:00:54.459Z"
        }),
        json!({
            "@id": "cwr/f1",
            "@type": "File",
            "name": "Continuous.nc",
            "contentUrl": {"@id": "vestitus/Continuous.nc"},
            "contentSize": 25027404,
            "encodingFormat": "application/x-netcdf",
            "isPartOf": {"@id": "cwr/ds"}
        }),
        json!({
            "@id": "cwr/f2",
            "@type": "File",
            "name": "INPUTS.png",
            "contentUrl": {"@id": "vestitus/INPUTS.png"},
            "isPartOf": {"@id": "cwr/ds"}
        }),
        person(),
    ])
}

fn workflow_dataset(with_mentions: bool) -> FlattenedGraph {
    let mut root = json!({
        "@id": "cwr/ds",
        "@type": "Dataset",
        "name": "Workflow run",
        "description": "A workflow run",
        "author": {"@id": "cwr/person"},
        "hasPart": [{"@id": "cwr/a"}, {"@id": "cwr/b"}, {"@id": "cwr/wf"}],
        "mainEntity": {"@id": "cwr/wf"},
        "license": {"@id": "https://spdx.org/licenses/MIT"}
    });
    if with_mentions {
        root["mentions"] = json!({"@id": "cwr/run"});
    }
    graph(vec![
        root,
        json!({"@id": "cwr/a", "@type": "File", "name": "testfile.txt",
               "contentUrl": {"@id": "out/testfile.txt"}, "resultOf": {"@id": "cwr/run"}}),
        json!({"@id": "cwr/b", "@type": "File", "name": "main.log",
               "contentUrl": {"@id": "out/main.log"}, "resultOf": {"@id": "cwr/run"}}),
        json!({"@id": "cwr/wf", "@type": ["File", "ComputationalWorkflow", "SoftwareSourceCode"],
               "name": "workflow.yaml", "contentUrl": {"@id": "workflow.yaml"},
               "programmingLanguage": {"@id": "cwr/lang"}, "input": {"@id": "cwr/param"}}),
        json!({"@id": "cwr/lang", "@type": "ComputerLanguage", "name": "Argo",
               "identifier": "https://argoproj.github.io/workflows"}),
        json!({"@id": "cwr/param", "@type": "FormalParameter", "name": "text", "additionalType": "Text"}),
        json!({"@id": "cwr/run", "@type": "CreateAction", "agent": {"@id": "cwr/person"},
               "object": {"@id": "cwr/value"}, "instrument": {"@id": "cwr/wf"},
               "result": [{"@id": "cwr/a"}, {"@id": "cwr/b"}]}),
        json!({"@id": "cwr/value", "@type": "PropertyValue", "name": "text", "value": "test parameter"}),
        person(),
    ])
}

fn workflow_urls() -> RemoteUrls {
    urls(&["cwr/ds", "cwr/a", "cwr/b", "cwr/wf", "cwr/person"])
}

fn root() -> ObjectId {
    ObjectId::new("cwr/ds")
}

#[test]
fn attached_crate_uses_local_paths() {
    let remote = urls(&["cwr/ds", "cwr/f1", "cwr/f2", "cwr/person"]);
    let krate = project(&root(), &plain_dataset(), &remote, ProjectOptions::attached()).unwrap();

    assert_eq!(krate.node_count(), 5);
    assert_eq!(krate.root_id(), "./");
    assert_eq!(
        krate.root().get("sameAs"),
        Some(&json!({"@id": "https://example.com/cwr/ds"}))
    );
    assert_eq!(
        krate.root().get("hasPart"),
        Some(&json!([{"@id": "vestitus/Continuous.nc"}, {"@id": "vestitus/INPUTS.png"}]))
    );
    assert_eq!(krate.root().get("author"), Some(&json!({"@id": ORCID})));
    assert_eq!(krate.root().get("keywords"), Some(&json!(["test1", "test2"])));
    for entity in krate.data_entities() {
        assert!(entity.get("sameAs").is_some());
    }

    let file = krate.get("vestitus/Continuous.nc").unwrap();
    assert_eq!(
        file.to_json(),
        json!({
            "@id": "vestitus/Continuous.nc",
            "@type": "File",
            "name": "Continuous.nc",
            "contentSize": 25027404,
            "encodingFormat": "application/x-netcdf",
            "sameAs": {"@id": "https://example.com/cwr/f1"},
            "contentUrl": "https://example.com/cwr/f1"
        })
    );
    match &file.kind {
        EntityKind::File {
            source: Some(FileSource::Remote(url)),
            fetch_remote: true,
        } => assert_eq!(url.as_str(), "https://example.com/cwr/f1"),
        other => panic!("unexpected kind {other:?}"),
    }

    let author = krate.get(ORCID).unwrap();
    assert_eq!(
        author.to_json(),
        json!({
            "@id": ORCID,
            "@type": "Person",
            "name": "Daniel Bauer",
            "sameAs": {"@id": "https://example.com/cwr/person"}
        })
    );

    assert_eq!(krate.profiles().declared(), vec![RO_CRATE_PROFILE]);
    assert_eq!(krate.context(), json!(RO_CRATE_CONTEXT));
}

#[test]
fn detached_crate_uses_remote_urls() {
    let remote = urls(&["cwr/ds", "cwr/f1", "cwr/f2", "cwr/person"]);
    let krate = project(&root(), &plain_dataset(), &remote, ProjectOptions::detached()).unwrap();

    assert_eq!(krate.node_count(), 5);
    assert_eq!(krate.root_id(), "https://example.com/cwr/ds/");
    assert!(krate.root().get("sameAs").is_none());
    for entity in krate.data_entities() {
        assert!(entity.id.starts_with("https://example.com/"));
        assert!(entity.get("sameAs").is_none());
        assert!(matches!(
            entity.kind,
            EntityKind::File {
                fetch_remote: false,
                ..
            }
        ));
    }
    assert_eq!(
        krate.root().get("hasPart"),
        Some(&json!([
            {"@id": "https://example.com/cwr/f1"},
            {"@id": "https://example.com/cwr/f2"}
        ]))
    );
    let doc = krate.metadata_document();
    assert_eq!(doc["@graph"][0]["about"], json!({"@id": "https://example.com/cwr/ds/"}));
}

#[test]
fn workflow_run_crate() {
    let krate = project(
        &root(),
        &workflow_dataset(true),
        &workflow_urls(),
        ProjectOptions::attached(),
    )
    .unwrap();

    assert_eq!(krate.node_count(), 13);
    assert_eq!(krate.main_entity(), Some("workflow.yaml"));
    assert_eq!(krate.root().get("mentions"), Some(&json!({"@id": "#cwr/run"})));

    let workflow = krate.get("workflow.yaml").unwrap();
    assert_eq!(workflow.get("input"), Some(&json!({"@id": "#cwr/param"})));
    assert_eq!(
        workflow.get("programmingLanguage"),
        Some(&json!({"@id": "https://argoproj.github.io/workflows"}))
    );

    let action = krate.get("#cwr/run").unwrap();
    assert!(action.has_type("CreateAction"));
    assert_eq!(action.get("agent"), Some(&json!({"@id": ORCID})));
    assert_eq!(action.get("instrument"), Some(&json!({"@id": "workflow.yaml"})));
    assert_eq!(action.get("object"), Some(&json!({"@id": "#cwr/value"})));
    assert_eq!(
        action.get("result"),
        Some(&json!([{"@id": "out/testfile.txt"}, {"@id": "out/main.log"}]))
    );
    assert!(krate.get("out/main.log").unwrap().get("resultOf").is_none());

    assert_eq!(krate.context(), json!([RO_CRATE_CONTEXT, WORKFLOW_RUN_TERMS]));
    let conforms = krate.root().get("conformsTo").unwrap().as_array().unwrap();
    assert_eq!(conforms.len(), 3);
    let profile = krate.get(WORKFLOW_RUN_PROFILES[0]).unwrap();
    assert!(profile.has_type("CreativeWork"));
    assert_eq!(profile.get("version"), Some(&json!("0.5")));
}

#[test]
fn profiles_escalate_with_content() {
    let remote = workflow_urls();
    let plain = project(
        &root(),
        &plain_dataset(),
        &urls(&["cwr/ds", "cwr/f1", "cwr/f2"]),
        ProjectOptions::attached(),
    )
    .unwrap();
    let workflow = project(&root(), &workflow_dataset(false), &remote, ProjectOptions::attached()).unwrap();
    let run = project(&root(), &workflow_dataset(true), &remote, ProjectOptions::attached()).unwrap();

    assert_eq!(plain.profiles().declared(), vec![RO_CRATE_PROFILE]);
    assert_eq!(
        workflow.profiles().declared(),
        vec![RO_CRATE_PROFILE, WORKFLOW_RO_CRATE_PROFILE, WORKFLOW_RUN_TERMS]
    );
    let mut expected = vec![RO_CRATE_PROFILE, WORKFLOW_RO_CRATE_PROFILE, WORKFLOW_RUN_TERMS];
    expected.extend(WORKFLOW_RUN_PROFILES);
    assert_eq!(run.profiles().declared(), expected);
    assert!(workflow.root().get("conformsTo").is_none());
}

#[test]
fn workflow_only_keeps_the_workflow() {
    let krate = project(
        &root(),
        &workflow_dataset(true),
        &workflow_urls(),
        ProjectOptions::attached().workflow_only(),
    )
    .unwrap();

    // descriptor, root, workflow, language, parameter, author
    assert_eq!(krate.node_count(), 6);
    assert_eq!(krate.root().get("hasPart"), Some(&json!([{"@id": "workflow.yaml"}])));
    assert!(krate.root().get("mentions").is_none());
    for gone in ["out/testfile.txt", "out/main.log", "#cwr/run", "#cwr/value"] {
        assert!(!krate.contains(gone), "{gone} should have been pruned");
    }
    assert!(krate.profiles().is_workflow_crate());
    assert!(!krate.profiles().is_workflow_run_crate());
}

#[test]
fn workflow_only_requires_main_entity() {
    let err = project(
        &root(),
        &plain_dataset(),
        &urls(&["cwr/ds"]),
        ProjectOptions::attached().workflow_only(),
    )
    .unwrap_err();
    assert!(matches!(err, CrateError::MissingMainEntity(_)));
    assert_eq!(err.class(), cwr_types::ErrorClass::Validation);
}

#[test]
fn detached_crate_requires_file_and_root_urls_but_not_person_urls() {
    let graph = workflow_dataset(true);

    let only_root = urls(&["cwr/ds"]);
    let err = project(&root(), &graph, &only_root, ProjectOptions::detached()).unwrap_err();
    assert!(matches!(err, CrateError::MissingRemoteUrl { role: "file", .. }));

    let only_files = urls(&["cwr/a", "cwr/b", "cwr/wf"]);
    let err = project(&root(), &graph, &only_files, ProjectOptions::detached()).unwrap_err();
    assert!(matches!(err, CrateError::MissingRemoteUrl { role: "root dataset", .. }));

    let no_person = urls(&["cwr/ds", "cwr/a", "cwr/b", "cwr/wf"]);
    let krate = project(&root(), &graph, &no_person, ProjectOptions::detached()).unwrap();
    assert_eq!(krate.root_id(), "https://example.com/cwr/ds/");
    let author = krate.get(ORCID).unwrap();
    assert_eq!(
        author.to_json(),
        json!({"@id": ORCID, "@type": "Person", "name": "Daniel Bauer"})
    );
    assert_eq!(
        krate.root().get("mainEntity"),
        Some(&json!({"@id": "https://example.com/cwr/wf"}))
    );
}

#[test]
fn child_datasets_become_crate_references() {
    let graph = graph(vec![
        json!({"@id": "cwr/ds", "@type": "Dataset", "name": "Parent", "hasPart": [{"@id": "cwr/child"}]}),
        json!({"@id": "cwr/child", "@type": "Dataset", "name": {"@value": "Child"},
               "isPartOf": {"@id": "cwr/ds"}}),
    ]);
    let krate = project(
        &root(),
        &graph,
        &urls(&["cwr/ds", "cwr/child"]),
        ProjectOptions::attached(),
    )
    .unwrap();

    let child = krate.get("https://example.com/cwr/child/").unwrap();
    assert!(matches!(child.kind, EntityKind::Dataset));
    assert_eq!(child.get("conformsTo"), Some(&json!({"@id": RO_CRATE_GENERIC})));
    assert_eq!(child.get("name"), Some(&json!("Child")));
    assert_eq!(child.get("description"), Some(&json!("Child")));
    assert!(child.get("isPartOf").is_none());
    assert_eq!(
        krate.root().get("hasPart"),
        Some(&json!([{"@id": "https://example.com/cwr/child/"}]))
    );
    // The root had no description either.
    assert_eq!(krate.root().get("description"), Some(&json!("Parent")));
}

#[test]
fn child_dataset_without_url_is_rejected() {
    let graph = graph(vec![
        json!({"@id": "cwr/ds", "@type": "Dataset", "name": "Parent", "hasPart": {"@id": "cwr/child"}}),
        json!({"@id": "cwr/child", "@type": "Dataset", "name": "Child"}),
    ]);
    let err = project(&root(), &graph, &urls(&["cwr/ds"]), ProjectOptions::attached()).unwrap_err();
    assert!(matches!(err, CrateError::MissingRemoteUrl { role: "dataset", .. }));
}

#[test]
fn parent_crate_is_linked_through_is_part_of() {
    let graph = graph(vec![json!({
        "@id": "cwr/ds", "@type": "Dataset", "name": "Child", "description": "d",
        "isPartOf": {"@id": "cwr/parent"}
    })]);

    let krate = project(
        &root(),
        &graph,
        &urls(&["cwr/ds", "cwr/parent"]),
        ProjectOptions::attached(),
    )
    .unwrap();
    let parent_id = "https://example.com/cwr/parent/";
    assert_eq!(krate.root().get("isPartOf"), Some(&json!({"@id": parent_id})));
    let parent = krate.get(parent_id).unwrap();
    assert_eq!(parent.get("conformsTo"), Some(&json!({"@id": RO_CRATE_GENERIC})));

    // Attached crates tolerate a parent without URL, detached ones do not.
    let krate = project(&root(), &graph, &urls(&["cwr/ds"]), ProjectOptions::attached()).unwrap();
    assert!(krate.root().get("isPartOf").is_none());
    let err = project(&root(), &graph, &urls(&["cwr/ds"]), ProjectOptions::detached()).unwrap_err();
    assert!(matches!(err, CrateError::MissingRemoteUrl { role: "parent dataset", .. }));
}

#[test]
fn references_to_unresolved_objects_fail_loudly() {
    let graph = graph(vec![
        json!({"@id": "cwr/ds", "@type": "Dataset", "name": "D",
               "hasPart": [{"@id": "cwr/f"}, {"@id": "cwr/hidden"}], "about": {"@id": "cwr/hidden"}}),
        json!({"@id": "cwr/f", "@type": "File", "contentUrl": {"@id": "f.txt"}}),
    ]);
    let err = project(&root(), &graph, &urls(&["cwr/f"]), ProjectOptions::attached()).unwrap_err();
    match &err {
        CrateError::DanglingReference { target, .. } => assert_eq!(target, "cwr/hidden"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Internal);
}

#[test]
fn single_unresolved_reference_fails_loudly() {
    let graph = graph(vec![
        json!({"@id": "cwr/ds", "@type": "Dataset", "name": "D", "author": {"@id": "cwr/nobody"}}),
    ]);
    let err = project(&root(), &graph, &urls(&["cwr/ds"]), ProjectOptions::detached()).unwrap_err();
    assert!(matches!(err, CrateError::DanglingReference { ref target, .. } if target == "cwr/nobody"));
}

#[test]
fn file_without_content_url_is_named_after_its_remote_url() {
    let graph = graph(vec![
        json!({"@id": "cwr/ds", "@type": "Dataset", "name": "D",
               "hasPart": [{"@id": "cwr/a"}, {"@id": "cwr/b"}]}),
        json!({"@id": "cwr/a", "@type": "File", "name": "table"}),
        json!({"@id": "cwr/b", "@type": "File", "name": "plot"}),
    ]);
    let mut remote = RemoteUrls::new();
    remote.insert(
        ObjectId::new("cwr/a"),
        "http://store.test/objects/cwr/a?payload=data.csv".into(),
    );
    remote.insert(ObjectId::new("cwr/b"), "http://store.test/files/plot.png".into());

    let krate = project(&root(), &graph, &remote, ProjectOptions::attached()).unwrap();
    assert_eq!(
        krate.root().get("hasPart"),
        Some(&json!([{"@id": "data.csv"}, {"@id": "plot.png"}]))
    );
    match &krate.get("data.csv").unwrap().kind {
        EntityKind::File {
            source: Some(FileSource::Remote(url)),
            fetch_remote: true,
        } => assert_eq!(url.as_str(), "http://store.test/objects/cwr/a?payload=data.csv"),
        other => panic!("unexpected kind {other:?}"),
    }
    assert!(krate.get("plot.png").is_some());
    assert!(krate.dangling_references().is_empty());
}

#[test]
fn missing_root_is_not_found() {
    let err = project(
        &ObjectId::new("cwr/other"),
        &plain_dataset(),
        &RemoteUrls::new(),
        ProjectOptions::attached(),
    )
    .unwrap_err();
    assert!(matches!(err, CrateError::RootMissing(_)));
}

#[test]
fn preview_is_rendered_on_request() {
    let remote = urls(&["cwr/ds", "cwr/f1", "cwr/f2"]);
    let krate = project(
        &root(),
        &plain_dataset(),
        &remote,
        ProjectOptions::attached().with_preview(),
    )
    .unwrap();
    let html = krate.preview_html().unwrap().unwrap();
    assert!(html.contains("<h1>Lathyrus vestitus</h1>"));
    assert!(html.contains("vestitus/INPUTS.png"));
}
