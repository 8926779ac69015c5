use dash_core::{api, AssetIndex, WatchSnapshot};
use gloo_net::http::Request;
use gloo_timers::callback::Interval;
use leptos::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use watch_control::{DashboardSession, WatchDriver, WATCH_PERIOD_MS};

/// One `/watch` response together with the asset it was requested for, so
/// stale arrivals can be matched against the active watch target.
#[derive(Clone)]
pub struct SnapshotArrival {
    pub asset: AssetIndex,
    pub result: Result<WatchSnapshot, String>,
}

/// `WatchDriver` backed by gloo: fetches go through `gloo-net`, the
/// periodic refresh is a `gloo_timers` interval that cancels on drop.
/// Arrivals are posted onto a signal bus the app reacts to.
#[derive(Clone)]
pub struct GlooDriver {
    api_base: String,
    bus: RwSignal<Option<SnapshotArrival>>,
}

impl GlooDriver {
    pub fn new(api_base: String, bus: RwSignal<Option<SnapshotArrival>>) -> Self {
        Self { api_base, bus }
    }
}

impl WatchDriver for GlooDriver {
    type Timer = Interval;

    fn request_snapshot(&self, asset: AssetIndex) {
        let url = api::watch_url(&self.api_base, asset);
        let bus = self.bus;
        spawn_local(async move {
            let result = match Request::get(&url).send().await {
                Ok(resp) if resp.ok() => resp
                    .json::<WatchSnapshot>()
                    .await
                    .map_err(|e| format!("watch decode failed: {e}")),
                Ok(resp) => Err(format!("watch request failed: {}", resp.status())),
                Err(e) => Err(format!("watch request error: {e}")),
            };
            bus.set(Some(SnapshotArrival { asset, result }));
        });
    }

    fn start_timer(&self, asset: AssetIndex) -> Interval {
        let driver = self.clone();
        Interval::new(WATCH_PERIOD_MS, move || driver.request_snapshot(asset))
    }
}

#[derive(Clone, Copy)]
pub struct AppCtx {
    pub session: RwSignal<DashboardSession<GlooDriver>>,
    pub api_base: RwSignal<String>,
    pub snapshots: RwSignal<Option<SnapshotArrival>>,
}

fn read_global(key: &str) -> Option<String> {
    js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

/// Empty base = same-origin relative requests.
pub fn api_base_default() -> String {
    read_global("DASHBOARD_API_BASE").unwrap_or_default()
}

pub fn provide_app_ctx(api_base: String) -> AppCtx {
    let snapshots = create_rw_signal(None::<SnapshotArrival>);
    let driver = GlooDriver::new(api_base.clone(), snapshots);
    let ctx = AppCtx {
        session: create_rw_signal(DashboardSession::new(driver)),
        api_base: create_rw_signal(api_base),
        snapshots,
    };
    provide_context(ctx);
    ctx
}

pub fn use_app_ctx() -> AppCtx {
    use_context::<AppCtx>().expect("AppCtx not provided")
}
