use crate::{
    render::{render_chart, CHART_TARGET},
    state::{api_base_default, provide_app_ctx, AppCtx},
    theme::GLOBAL_CSS,
};
use chart_model::SummaryBlock;
use dash_core::{
    api, AccountInfo, AssetIndex, AssetStatus, AssetTypeFilter, BacktestRunResult, ReferenceData,
    TypeIndex,
};
use gloo_net::http::Request;
use leptos::*;
use wasm_bindgen_futures::spawn_local;

fn log(msg: &str) {
    web_sys::console::log_1(&msg.into());
}

fn log_error(msg: &str) {
    web_sys::console::error_1(&msg.into());
}

/// Signals the view reads; handlers write them after mutating the session.
#[derive(Clone, Copy)]
struct PanelSignals {
    tickers: RwSignal<Vec<(AssetIndex, String)>>,
    selected_asset: RwSignal<Option<AssetIndex>>,
    watching: RwSignal<bool>,
    account: RwSignal<Option<AccountInfo>>,
    account_error: RwSignal<Option<String>>,
    status_note: RwSignal<String>,
}

fn fetch_account_info(ctx: AppCtx, panels: PanelSignals, asset_type: TypeIndex) {
    let url = api::accinfo_url(&ctx.api_base.get_untracked(), asset_type);
    spawn_local(async move {
        let fetched = match Request::get(&url).send().await {
            Ok(resp) if resp.ok() => resp
                .json::<AccountInfo>()
                .await
                .map_err(|e| format!("account info decode failed: {e}")),
            Ok(resp) => Err(format!("account info failed: {}", resp.status())),
            Err(e) => Err(format!("account info error: {e}")),
        };
        match fetched {
            Ok(info) => {
                ctx.session.update(|s| s.resolve_account(asset_type, info));
                panels.account.set(Some(info));
                panels.account_error.set(None);
            }
            Err(e) => {
                // Previous panel contents stay; the error indicator is enough.
                ctx.session.update(|s| s.reject_account(asset_type));
                log_error(&e);
                panels.account_error.set(Some(e));
            }
        }
    });
}

fn apply_selection(ctx: AppCtx, panels: PanelSignals, effect: watch_control::SelectionEffect) {
    panels.selected_asset.set(Some(effect.asset));
    if let Some(asset_type) = effect.account_fetch {
        fetch_account_info(ctx, panels, asset_type);
    }
    panels
        .watching
        .set(ctx.session.with_untracked(|s| s.is_watching()));
}

fn load_reference_data(
    ctx: AppCtx,
    panels: PanelSignals,
    type_labels: RwSignal<Vec<String>>,
    algorithms: RwSignal<Vec<String>>,
) {
    let url = api::data_url(&ctx.api_base.get_untracked());
    spawn_local(async move {
        let loaded = match Request::get(&url).send().await {
            Ok(resp) if resp.ok() => resp
                .json::<ReferenceData>()
                .await
                .map_err(|e| format!("reference data decode failed: {e}")),
            Ok(resp) => Err(format!("reference data failed: {}", resp.status())),
            Err(e) => Err(format!("reference data error: {e}")),
        };
        let data = match loaded {
            Ok(data) => data,
            Err(e) => {
                // Controls stay empty; every later lookup reports
                // UnresolvedReference instead of indexing past the end.
                log_error(&e);
                panels.status_note.set(e);
                return;
            }
        };
        ctx.session.update(|s| s.load_reference(data));
        ctx.session.with_untracked(|s| {
            type_labels.set(s.reference().types.clone());
            algorithms.set(
                s.reference()
                    .algorithms
                    .iter()
                    .map(|a| a.name.clone())
                    .collect(),
            );
            panels.tickers.set(s.visible_tickers());
        });
        let first = ctx
            .session
            .with_untracked(|s| s.visible_tickers().first().map(|(i, _)| *i));
        if let Some(first) = first {
            let effect = ctx.session.try_update(|s| {
                if let Err(e) = s.select_algorithm(0) {
                    log_error(&format!("no default algorithm: {e}"));
                }
                s.select_asset(first)
            });
            if let Some(Ok(effect)) = effect {
                apply_selection(ctx, panels, effect);
            }
            panels.status_note.set("Watching".into());
        } else {
            panels.status_note.set("No assets available".into());
        }
    });
}

fn run_backtest(
    ctx: AppCtx,
    panels: PanelSignals,
    ranges: String,
    summaries: RwSignal<Vec<SummaryBlock>>,
    warnings: RwSignal<Vec<String>>,
) {
    let request = match ctx.session.try_update(|s| s.begin_backtest()) {
        Some(Ok(req)) => req,
        Some(Err(e)) => {
            panels.status_note.set(e.to_string());
            return;
        }
        None => return,
    };
    panels.watching.set(false);
    panels.status_note.set("Backtesting".into());
    let ranges = (!ranges.trim().is_empty()).then_some(ranges);
    let url = api::backtest_url(
        &ctx.api_base.get_untracked(),
        request.asset,
        request.algorithm,
        ranges.as_deref(),
    );
    spawn_local(async move {
        let fetched = match Request::get(&url).send().await {
            Ok(resp) if resp.ok() => resp
                .json::<Vec<BacktestRunResult>>()
                .await
                .map_err(|e| format!("backtest decode failed: {e}")),
            Ok(resp) => Err(format!("backtest failed: {}", resp.status())),
            Err(e) => Err(format!("backtest error: {e}")),
        };
        match fetched {
            Ok(results) => {
                let (blocks, warns) = chart_model::summarize_backtests(&results);
                panels
                    .status_note
                    .set(format!("Backtest complete ({} runs)", blocks.len()));
                summaries.set(blocks);
                warnings.set(warns.iter().map(|w| w.to_string()).collect());
            }
            Err(e) => {
                // Prior results stay rendered.
                log_error(&e);
                panels.status_note.set(e);
            }
        }
    });
}

#[component]
pub fn App() -> impl IntoView {
    let ctx = provide_app_ctx(api_base_default());

    let type_labels = create_rw_signal(Vec::<String>::new());
    let algorithms = create_rw_signal(Vec::<String>::new());
    let summaries = create_rw_signal(Vec::<SummaryBlock>::new());
    let warnings = create_rw_signal(Vec::<String>::new());
    let asset_status = create_rw_signal(None::<AssetStatus>);
    let panels = PanelSignals {
        tickers: create_rw_signal(Vec::new()),
        selected_asset: create_rw_signal(None),
        watching: create_rw_signal(false),
        account: create_rw_signal(None),
        account_error: create_rw_signal(None),
        status_note: create_rw_signal(String::from("Loading reference data")),
    };

    load_reference_data(ctx, panels, type_labels, algorithms);

    // Snapshot arrivals: drop stale responses, keep the previous chart on
    // any failure.
    create_effect(move |_| {
        let Some(arrival) = ctx.snapshots.get() else {
            return;
        };
        if !ctx
            .session
            .with_untracked(|s| s.accepts_snapshot(arrival.asset))
        {
            log(&format!(
                "discarding stale snapshot for asset {}",
                arrival.asset
            ));
            return;
        }
        let snapshot = match arrival.result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log_error(&e);
                panels.status_note.set(e);
                return;
            }
        };
        match chart_model::shape_snapshot(&snapshot) {
            Ok(model) => {
                if let Err(err) = render_chart(CHART_TARGET, &model) {
                    web_sys::console::error_1(&err);
                }
                asset_status.set(snapshot.asset);
                panels
                    .status_note
                    .set(format!("Watching {}", snapshot.ticker));
            }
            Err(e) => {
                log_error(&e.to_string());
                panels.status_note.set(e.to_string());
            }
        }
    });

    on_cleanup(move || ctx.session.update(|s| s.stop_watch()));

    let on_type_change = move |ev| {
        let value = event_target_value(&ev);
        let Some(filter) = AssetTypeFilter::from_select_value(&value) else {
            log_error(&format!("unparseable type filter: {value}"));
            return;
        };
        match ctx.session.try_update(|s| s.set_type_filter(filter)) {
            Some(Ok(Some(effect))) => apply_selection(ctx, panels, effect),
            Some(Ok(None)) => {
                // Either the selection survived the filter or nothing is
                // visible any more.
                let (selected, watching) = ctx
                    .session
                    .with_untracked(|s| (s.selected_asset(), s.is_watching()));
                panels.selected_asset.set(selected);
                panels.watching.set(watching);
                if selected.is_none() {
                    panels.status_note.set("No assets match this type".into());
                }
            }
            Some(Err(e)) => log_error(&e.to_string()),
            None => {}
        }
        panels
            .tickers
            .set(ctx.session.with_untracked(|s| s.visible_tickers()));
    };

    let on_ticker_change = move |ev| {
        let value = event_target_value(&ev);
        let Ok(index) = value.parse::<AssetIndex>() else {
            log_error(&format!("unparseable asset index: {value}"));
            return;
        };
        match ctx.session.try_update(|s| s.select_asset(index)) {
            Some(Ok(effect)) => apply_selection(ctx, panels, effect),
            Some(Err(e)) => {
                log_error(&e.to_string());
                panels.status_note.set(e.to_string());
            }
            None => {}
        }
    };

    let on_algo_change = move |ev| {
        let value = event_target_value(&ev);
        let Ok(index) = value.parse::<usize>() else {
            return;
        };
        if let Some(Err(e)) = ctx.session.try_update(|s| s.select_algorithm(index)) {
            log_error(&e.to_string());
        }
    };

    let (ranges_text, set_ranges_text) = create_signal(String::new());

    let on_backtest = move |_| {
        run_backtest(ctx, panels, ranges_text.get_untracked(), summaries, warnings);
    };

    let on_stop = move |_| {
        ctx.session.update(|s| s.stop_watch());
        panels.watching.set(false);
        panels.status_note.set("Stopped watching".into());
        log("Stopped watching...");
    };

    let on_shutdown = move |_| {
        // Fire and forget; the backend goes away, no schema to decode.
        let url = api::shutdown_url(&ctx.api_base.get_untracked());
        panels.status_note.set("Shutting down backend".into());
        spawn_local(async move {
            if let Err(e) = Request::get(&url).send().await {
                log_error(&format!("shutdown error: {e}"));
            }
        });
    };

    view! {
        <style>{GLOBAL_CSS}</style>
        <div class="dashboard">
            <div class="flex-col">
                <div class="panel flex-col">
                    <div class="section-label">Selection</div>
                    <select id="asset-type-select" on:change=on_type_change>
                        <option value="-1">"All"</option>
                        {move || {
                            type_labels
                                .get()
                                .into_iter()
                                .enumerate()
                                .map(|(i, label)| {
                                    view! { <option value=i.to_string()>{label}</option> }
                                })
                                .collect_view()
                        }}
                    </select>
                    <select
                        id="ticker-select"
                        on:change=on_ticker_change
                        prop:value=move || {
                            panels
                                .selected_asset
                                .get()
                                .map(|i| i.to_string())
                                .unwrap_or_default()
                        }
                    >
                        {move || {
                            panels
                                .tickers
                                .get()
                                .into_iter()
                                .map(|(i, ticker)| {
                                    view! { <option value=i.to_string()>{ticker}</option> }
                                })
                                .collect_view()
                        }}
                    </select>
                    <select id="algo-select" on:change=on_algo_change>
                        {move || {
                            algorithms
                                .get()
                                .into_iter()
                                .enumerate()
                                .map(|(i, name)| {
                                    view! { <option value=i.to_string()>{name}</option> }
                                })
                                .collect_view()
                        }}
                    </select>
                    <input
                        type="text"
                        placeholder="ranges, e.g. 10, 20, 30"
                        prop:value=move || ranges_text.get()
                        on:input=move |ev| set_ranges_text.set(event_target_value(&ev))
                    />
                    <div class="flex-row">
                        <button on:click=on_backtest>"Backtest"</button>
                        <button on:click=on_stop>"Stop"</button>
                        <button on:click=on_shutdown>"Shutdown"</button>
                    </div>
                    <div class="muted">{move || panels.status_note.get()}</div>
                    <div class="muted">
                        {move || if panels.watching.get() { "watch: active" } else { "watch: off" }}
                    </div>
                </div>

                <div class="panel">
                    <div class="section-label">Account</div>
                    {move || match panels.account.get() {
                        Some(info) => view! {
                            <table class="summary-table">
                                <tr><td>"balance"</td><td>{format!("{:.2}", info.balance)}</td></tr>
                                <tr><td>"buying power"</td><td>{format!("{:.2}", info.buying_power)}</td></tr>
                                <tr><td>"equity"</td><td>{format!("{:.2}", info.equity)}</td></tr>
                            </table>
                        }
                        .into_view(),
                        None => view! { <div class="muted">"No account info"</div> }.into_view(),
                    }}
                    {move || {
                        panels
                            .account_error
                            .get()
                            .map(|e| view! { <div class="error-note">{e}</div> })
                    }}
                </div>

                <div class="panel">
                    <div class="section-label">Asset</div>
                    {move || match asset_status.get() {
                        Some(status) => view! {
                            <table class="summary-table">
                                <tr><td>"live"</td><td>{status.live.to_string()}</td></tr>
                                <tr><td>"paper"</td><td>{status.paper.to_string()}</td></tr>
                                <tr><td>"shares"</td><td>{format!("{:.4}", status.shares)}</td></tr>
                                <tr><td>"risk"</td><td>{format!("{:.4}", status.risk)}</td></tr>
                            </table>
                        }
                        .into_view(),
                        None => view! { <div class="muted">"No asset data"</div> }.into_view(),
                    }}
                </div>

                {move || {
                    let warns = warnings.get();
                    (!warns.is_empty())
                        .then(|| {
                            view! {
                                <div class="panel">
                                    <div class="section-label">Warnings</div>
                                    {warns
                                        .into_iter()
                                        .map(|w| view! { <div class="warning-note">{w}</div> })
                                        .collect_view()}
                                </div>
                            }
                        })
                }}
            </div>

            <div class="flex-col">
                <div class="panel">
                    <div id="chart-window"></div>
                </div>
                {move || {
                    summaries
                        .get()
                        .into_iter()
                        .map(|block| {
                            view! {
                                <div class="panel">
                                    <div class="section-label">{block.heading}</div>
                                    <table class="summary-table">
                                        {block
                                            .rows
                                            .into_iter()
                                            .map(|row| {
                                                view! {
                                                    <tr>
                                                        <td>{row.label}</td>
                                                        <td>{row.value}</td>
                                                    </tr>
                                                }
                                            })
                                            .collect_view()}
                                    </table>
                                </div>
                            }
                        })
                        .collect_view()
                }}
            </div>
        </div>
    }
}
