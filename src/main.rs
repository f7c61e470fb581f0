use std::sync::Arc;

use mimalloc::MiMalloc;
use tracing::error;
use walkshed::{catalog::Catalog, graph, web};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let catalog = Arc::new(Catalog::load_from_env());

    let graph_catalog = catalog.clone();
    let init = graph::GRAPH
        .initialize(move || async move {
            let (nodes, edges) = graph_catalog.road_records();
            Ok(graph::RoadGraph::load(nodes, edges))
        })
        .await;
    if let Err(err) = init {
        // keep serving; isochrone requests answer 500 until the data is fixed
        error!("road graph load failed: {err}");
    }

    web::serve(catalog).await;

    Ok(())
}
