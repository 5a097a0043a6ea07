use crate::bridge::model::ReportModel;
use anyhow::{Context, Result};
use log::info;
use ppvcore::OutlierMode;
use serde::Deserialize;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

type SharedModel = Arc<RwLock<ReportModel>>;

fn read(state: &SharedModel) -> RwLockReadGuard<'_, ReportModel> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    outliers: Option<bool>,
}

/// Bridge that hosts the JSON endpoint consumed by the dashboard.
pub struct ReportBridge {
    state: SharedModel,
}

impl ReportBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ReportModel::default())),
        }
    }

    /// Serves the current model on `addr` from a background thread and
    /// returns the bound address.
    pub fn serve(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());

        let summary_route = warp::path!("summary")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let model = read(&state);
                warp::reply::json(&model.raw)
            });

        let corrected_route = warp::path!("summary" / "corrected")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let model = read(&state);
                warp::reply::json(&model.corrected)
            });

        let file_route = warp::path!("files" / String)
            .and(warp::get())
            .and(warp::query::<FileQuery>())
            .and(state_filter)
            .map(|number: String, query: FileQuery, state: SharedModel| {
                let model = read(&state);
                let mode = OutlierMode::from(query.outliers.unwrap_or(false));
                let reply = match model.files.get(&number) {
                    Some(detail) => warp::reply::with_status(
                        warp::reply::json(&detail.view(mode)),
                        StatusCode::OK,
                    ),
                    None => warp::reply::with_status(
                        warp::reply::json(&json!({"status": "not found", "file": number})),
                        StatusCode::NOT_FOUND,
                    ),
                };
                reply
            });

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for the report bridge")?;
        let routes = summary_route.or(corrected_route).or(file_route);
        // Binding needs the runtime's reactor; failures surface here, not in the thread.
        let (bound, server) = {
            let _guard = runtime.enter();
            warp::serve(routes)
                .try_bind_ephemeral(addr)
                .with_context(|| format!("binding report bridge to {}", addr))?
        };
        thread::spawn(move || runtime.block_on(server));
        info!("report bridge listening on http://{}", bound);
        Ok(bound)
    }

    pub fn publish(&self, model: ReportModel) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = model;
        println!(
            "[bridge] summary rows: {}, files: {}",
            guard.raw.len(),
            guard.files.len()
        );
    }

    pub fn publish_status(&self, message: &str) {
        println!("[bridge] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> ReportModel {
        read(&self.state).clone()
    }
}

impl Default for ReportBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::WorkflowConfig;
    use crate::workflow::runner::Runner;
    use ppvcore::UploadedFile;

    fn upload(name: &str, peaks: &[f64]) -> UploadedFile {
        let mut text = String::from("RION VM-56\nStart Time,Address,X_AP,Y_AP,Z_AP\n");
        for (window, peak) in peaks.iter().enumerate() {
            text.push_str(&format!(
                "2024/03/15 10:{:02}:00,{},{},{},{}\n",
                window,
                window * 10 + 1,
                peak,
                peak,
                peak
            ));
        }
        UploadedFile::new(name, text.into_bytes())
    }

    #[test]
    fn bridge_publishes_both_views() {
        let mut cfg = WorkflowConfig::default();
        cfg.require_receivers = false;
        let mut runner = Runner::new(cfg);
        let mut peaks = vec![0.1; 11];
        peaks.push(5.0);
        let summary = runner
            .execute(&[upload("VM_Inst_0055_0001.rnd", &peaks)])
            .unwrap();

        let bridge = ReportBridge::new();
        bridge.publish(ReportModel::from_summary(&summary));
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.raw.len(), 1);
        assert_eq!(snapshot.raw[0].x_ppv, 5.0);
        assert_eq!(snapshot.corrected[0].x_ppv, 0.1);

        let detail = &snapshot.files["0055"];
        assert_eq!(detail.view(OutlierMode::Raw).records.len(), 12);
        assert_eq!(detail.view(OutlierMode::Corrected).records[11].x_ppv, 0.1);
        assert_eq!(detail.period, Some(ppvcore::records::Period::Day));
        let json = serde_json::to_value(detail.view(OutlierMode::Corrected)).unwrap();
        assert_eq!(json["mode"], "corrected");
    }

    #[test]
    fn occupied_address_fails_to_serve() {
        let bridge = ReportBridge::new();
        let bound = bridge.serve("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(bound.port(), 0);
        let err = ReportBridge::new().serve(bound).unwrap_err();
        assert!(err.to_string().contains("binding report bridge"));
    }
}
