use anyhow::{anyhow, Result};
use seismic_client::domain::SeismicRecord;
use seismic_ingestion::{
    config::{AppConfig, StoreKind},
    http::{self, IngestState},
    metrics_server, observability,
    pipeline::Pipeline,
    sinks::{DynamoDbStore, PostgresStore, PutOutcome, RecordStore, StoreError, StoreSink},
    sources::ArcGisSource,
    transform::{Provenance, SeismicNormalizer, IGP_SOURCE_LABEL},
};
use std::{net::SocketAddr, sync::Arc};

enum RecordStoreBackend {
    DynamoDb(DynamoDbStore),
    Postgres(PostgresStore),
}

#[async_trait::async_trait]
impl RecordStore for RecordStoreBackend {
    fn table(&self) -> &str {
        match self {
            Self::DynamoDb(s) => s.table(),
            Self::Postgres(s) => s.table(),
        }
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        match self {
            Self::DynamoDb(s) => s.ensure_table().await,
            Self::Postgres(s) => s.ensure_table().await,
        }
    }

    async fn put_if_absent(&self, record: &SeismicRecord) -> Result<PutOutcome, StoreError> {
        match self {
            Self::DynamoDb(s) => s.put_if_absent(record).await,
            Self::Postgres(s) => s.put_if_absent(record).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store_cfg = &cfg.store;
    let store = match store_cfg.kind {
        StoreKind::DynamoDb => RecordStoreBackend::DynamoDb(
            DynamoDbStore::connect(
                store_cfg.table.clone(),
                store_cfg.region.clone(),
                store_cfg.endpoint_url.clone(),
            )
            .await,
        ),
        StoreKind::Postgres => {
            let uri = store_cfg
                .postgres_uri
                .as_deref()
                .ok_or_else(|| anyhow!("store.postgres_uri is required for the postgres store"))?;
            RecordStoreBackend::Postgres(
                PostgresStore::connect(uri, store_cfg.max_connections, store_cfg.table.clone()).await?,
            )
        }
    };

    // Provision once, before the first invocation can write.
    store.ensure_table().await?;

    let source = ArcGisSource::from_config(&cfg.upstream)?;
    let provenance = Provenance {
        label: IGP_SOURCE_LABEL.to_string(),
        url: cfg.upstream.page_url.clone(),
    };
    let state = Arc::new(IngestState {
        pipeline: Pipeline {
            source,
            transform: Arc::new(SeismicNormalizer::new(provenance)),
            sink: StoreSink::new(store),
        },
        table: store_cfg.table.clone(),
    });

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, table = %store_cfg.table, "seismic ingestion trigger listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
