//! Serves `Bar` and `ClusterBar` of `foo.example.com/v1alpha1` from memory.
//!
//! Usage: `foo-apiserver [serve] [options.yaml]`
//!
//! Without `serve`, every kind is exercised once through its storage and the
//! server stops. With `serve`, it runs until the process is killed.
use std::env;
use std::process;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use k8_apiserver::api_resource;
use k8_apiserver::resource;
use k8_apiserver::Builder;
use k8_apiserver::RecommendedOptions;
use k8_apiserver::RequestContext;
use k8_apiserver::StopSignal;
use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::GroupVersion;
use k8_types::ItemMeta;
use k8_types::Spec;
use k8_types::Status;

const COMPONENT_NAME: &str = "foo";
const GROUP: &str = "foo.example.com";
const VERSION: &str = "v1alpha1";

const BAR_API: Crd = Crd {
    group: GROUP,
    version: VERSION,
    names: CrdNames {
        kind: "Bar",
        plural: "bars",
    },
};

const CLUSTER_BAR_API: Crd = Crd {
    group: GROUP,
    version: VERSION,
    names: CrdNames {
        kind: "ClusterBar",
        plural: "clusterbars",
    },
};

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
struct BarSpec {
    message: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
struct BarStatus {}

impl Status for BarStatus {}

impl Spec for BarSpec {
    type Status = BarStatus;

    fn metadata() -> &'static Crd {
        &BAR_API
    }
}

api_resource!(BarSpec);

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
struct ClusterBarSpec {
    message: String,
}

impl Spec for ClusterBarSpec {
    type Status = BarStatus;
    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &CLUSTER_BAR_API
    }
}

api_resource!(ClusterBarSpec);

fn builder(options_path: Option<String>) -> Result<Builder> {
    let group_version = GroupVersion::new(GROUP, VERSION);
    let mut builder = Builder::new()
        .with_component_name(COMPONENT_NAME)
        .with(resource::<BarSpec>(vec![group_version.clone()])?)
        .with(resource::<ClusterBarSpec>(vec![group_version])?);
    if let Some(path) = options_path {
        builder = builder.with_recommended_options(RecommendedOptions::from_file(path)?);
    }
    Ok(builder)
}

fn main() -> Result<()> {
    fluvio_future::subscriber::init_logger();

    let mut args = env::args().skip(1).peekable();
    if args.peek().map(String::as_str) == Some("serve") {
        args.next();
        process::exit(builder(args.next())?.execute());
    }

    let server = builder(args.next())?.build()?;

    let stop = StopSignal::shared();
    server.start(stop.clone())?;

    fluvio_future::task::run_block_on(async {
        for (resource, metadata) in [
            ("bars", json!({ "namespace": "default", "generateName": "test-" })),
            ("clusterbars", json!({ "generateName": "test-" })),
        ] {
            let storage = server
                .storage(GROUP, VERSION, resource)
                .ok_or_else(|| anyhow::anyhow!("{} is not served", resource))?;
            let ctx = RequestContext::new();

            let created = storage
                .create(&ctx, json!({ "metadata": metadata, "spec": { "message": "hello" } }))
                .await?;
            let name = created["metadata"]["name"].as_str().unwrap_or_default();
            let namespace = created["metadata"]["namespace"].as_str().unwrap_or_default();
            info!(resource, name, namespace, "created");

            let item = ItemMeta::new(name, namespace);
            storage.get(&ctx, &item).await?;
            storage.delete(&ctx, &item).await?;
            info!(resource, name, "deleted");
        }
        Ok::<(), anyhow::Error>(())
    })?;

    stop.notify();
    fluvio_future::task::run_block_on(server.run(stop))?;
    Ok(())
}
