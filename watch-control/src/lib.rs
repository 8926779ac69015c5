use dash_core::{
    AccountInfo, AlgoIndex, AssetIndex, AssetTypeFilter, DashError, ReferenceData, TypeIndex,
};

/// Fixed watch refresh period.
pub const WATCH_PERIOD_MS: u32 = 60_000;

/// Side of the watch loop that touches the outside world. Concrete
/// implementations live in platform-specific crates; tests use a counting
/// fake. Dropping the timer handle cancels the repeating refresh.
pub trait WatchDriver {
    type Timer;

    /// Issue one asynchronous `/watch` refresh for `asset`.
    fn request_snapshot(&self, asset: AssetIndex);

    /// Arm a repeating refresh for `asset` at `WATCH_PERIOD_MS`.
    fn start_timer(&self, asset: AssetIndex) -> Self::Timer;
}

/// Single-slot polling state machine: at most one live timer at any
/// instant, keyed by the selected asset. Nothing else may touch the
/// timer slot.
pub struct WatchController<D: WatchDriver> {
    driver: D,
    active: Option<AssetIndex>,
    timer: Option<D::Timer>,
}

impl<D: WatchDriver> WatchController<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            active: None,
            timer: None,
        }
    }

    /// Start (or restart) watching `asset`. Idempotent: re-selecting the
    /// active asset neither refreshes nor re-arms the timer. Returns
    /// whether the watch target changed.
    pub fn set_selected_asset(&mut self, asset: AssetIndex) -> bool {
        if self.active == Some(asset) {
            return false;
        }
        // Cancel before start; the old handle must be gone before a new
        // one exists.
        self.timer = None;
        self.driver.request_snapshot(asset);
        self.timer = Some(self.driver.start_timer(asset));
        self.active = Some(asset);
        true
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        self.timer = None;
        self.active = None;
    }

    pub fn is_watching(&self) -> bool {
        self.timer.is_some()
    }

    pub fn active_asset(&self) -> Option<AssetIndex> {
        self.active
    }

    /// Stale-response guard: a snapshot that arrives for anything other
    /// than the active asset is discarded by the caller.
    pub fn accepts(&self, requested: AssetIndex) -> bool {
        self.active == Some(requested)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

/// Memoizes the last rendered `/accinfo` response per asset type. Assets
/// sharing a type must not re-fetch on every ticker change; the key is the
/// type, never the asset.
#[derive(Debug, Default)]
pub struct AccountInfoCache {
    rendered: Option<TypeIndex>,
    inflight: Option<TypeIndex>,
    info: Option<AccountInfo>,
}

impl AccountInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the caller must fetch `/accinfo` for this type.
    /// A type already rendered or already being fetched needs nothing.
    pub fn ensure(&mut self, asset_type: TypeIndex) -> bool {
        if self.rendered == Some(asset_type) || self.inflight == Some(asset_type) {
            return false;
        }
        self.inflight = Some(asset_type);
        true
    }

    pub fn resolve(&mut self, asset_type: TypeIndex, info: AccountInfo) {
        if self.inflight == Some(asset_type) {
            self.inflight = None;
        }
        self.rendered = Some(asset_type);
        self.info = Some(info);
    }

    /// A failed fetch keeps the previously rendered info; clearing the
    /// in-flight mark lets the next `ensure` for this type retry.
    pub fn reject(&mut self, asset_type: TypeIndex) {
        if self.inflight == Some(asset_type) {
            self.inflight = None;
        }
    }

    pub fn info(&self) -> Option<AccountInfo> {
        self.info
    }

    pub fn rendered_type(&self) -> Option<TypeIndex> {
        self.rendered
    }
}

/// What the caller must do after a selection change: the session itself
/// performs no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionEffect {
    pub asset: AssetIndex,
    pub watch_restarted: bool,
    /// `Some` when `/accinfo` must be fetched for this type.
    pub account_fetch: Option<TypeIndex>,
}

/// Parameters of a backtest request the caller is expected to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestRequest {
    pub asset: AssetIndex,
    pub algorithm: AlgoIndex,
}

/// Owns the whole dashboard session: reference data, current selection,
/// watch controller and account cache. Replaces the script-global state of
/// earlier revisions with one struct constructed and torn down explicitly.
pub struct DashboardSession<D: WatchDriver> {
    reference: ReferenceData,
    filter: AssetTypeFilter,
    selected_asset: Option<AssetIndex>,
    selected_algorithm: Option<AlgoIndex>,
    watch: WatchController<D>,
    account: AccountInfoCache,
}

impl<D: WatchDriver> DashboardSession<D> {
    pub fn new(driver: D) -> Self {
        Self {
            reference: ReferenceData::default(),
            filter: AssetTypeFilter::All,
            selected_asset: None,
            selected_algorithm: None,
            watch: WatchController::new(driver),
            account: AccountInfoCache::new(),
        }
    }

    /// Install the one-shot `/data` payload. There is no refresh path; a
    /// failed initial load leaves the session empty and every indexed
    /// lookup reports `UnresolvedReference`.
    pub fn load_reference(&mut self, data: ReferenceData) {
        self.reference = data;
        self.filter = AssetTypeFilter::All;
        self.selected_asset = None;
        self.selected_algorithm = None;
        self.watch.stop();
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn type_filter(&self) -> AssetTypeFilter {
        self.filter
    }

    pub fn selected_asset(&self) -> Option<AssetIndex> {
        self.selected_asset
    }

    pub fn selected_algorithm(&self) -> Option<AlgoIndex> {
        self.selected_algorithm
    }

    /// Ticker list for the current filter, cloned for display.
    pub fn visible_tickers(&self) -> Vec<(AssetIndex, String)> {
        self.reference
            .tickers_for(self.filter)
            .into_iter()
            .map(|(i, t)| (i, t.to_string()))
            .collect()
    }

    /// Select an asset by reference index: restarts the watch when the key
    /// changed and requests account info when the effective type changed.
    pub fn select_asset(&mut self, index: AssetIndex) -> Result<SelectionEffect, DashError> {
        let type_index = self.reference.asset(index)?.type_index;
        let watch_restarted = self.watch.set_selected_asset(index);
        self.selected_asset = Some(index);
        let account_fetch = self.account.ensure(type_index).then_some(type_index);
        Ok(SelectionEffect {
            asset: index,
            watch_restarted,
            account_fetch,
        })
    }

    /// Change the ticker-list filter. When the current asset falls out of
    /// the filtered list the first visible asset is selected, matching the
    /// dropdown reset of the original UI; an empty list stops the watch.
    pub fn set_type_filter(
        &mut self,
        filter: AssetTypeFilter,
    ) -> Result<Option<SelectionEffect>, DashError> {
        self.filter = filter;
        let still_visible = self
            .selected_asset
            .and_then(|i| self.reference.assets.get(i))
            .map_or(false, |a| filter.matches(a.type_index));
        if still_visible {
            return Ok(None);
        }
        match self.reference.tickers_for(filter).first().map(|(i, _)| *i) {
            Some(first) => self.select_asset(first).map(Some),
            None => {
                self.watch.stop();
                self.selected_asset = None;
                Ok(None)
            }
        }
    }

    pub fn select_algorithm(&mut self, index: AlgoIndex) -> Result<(), DashError> {
        self.reference.algorithm(index)?;
        self.selected_algorithm = Some(index);
        Ok(())
    }

    /// A backtest stops the active watch so a late refresh cannot
    /// overwrite the result rendering.
    pub fn begin_backtest(&mut self) -> Result<BacktestRequest, DashError> {
        let asset = self.selected_asset.ok_or(DashError::NoAssetSelected)?;
        let algorithm = self
            .selected_algorithm
            .ok_or(DashError::NoAlgorithmSelected)?;
        self.watch.stop();
        Ok(BacktestRequest { asset, algorithm })
    }

    pub fn stop_watch(&mut self) {
        self.watch.stop();
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_watching()
    }

    pub fn accepts_snapshot(&self, requested: AssetIndex) -> bool {
        self.watch.accepts(requested)
    }

    pub fn account(&self) -> &AccountInfoCache {
        &self.account
    }

    pub fn resolve_account(&mut self, asset_type: TypeIndex, info: AccountInfo) {
        self.account.resolve(asset_type, info);
    }

    pub fn reject_account(&mut self, asset_type: TypeIndex) {
        self.account.reject(asset_type);
    }

    pub fn watch(&self) -> &WatchController<D> {
        &self.watch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_core::{AlgorithmRef, Asset};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct TestDriver {
        live_timers: Rc<Cell<usize>>,
        fetches: Rc<RefCell<Vec<AssetIndex>>>,
        timers_started: Rc<RefCell<Vec<AssetIndex>>>,
    }

    struct TestTimer {
        live: Rc<Cell<usize>>,
    }

    impl Drop for TestTimer {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl WatchDriver for TestDriver {
        type Timer = TestTimer;

        fn request_snapshot(&self, asset: AssetIndex) {
            self.fetches.borrow_mut().push(asset);
        }

        fn start_timer(&self, asset: AssetIndex) -> TestTimer {
            self.timers_started.borrow_mut().push(asset);
            self.live_timers.set(self.live_timers.get() + 1);
            TestTimer {
                live: self.live_timers.clone(),
            }
        }
    }

    fn reference() -> ReferenceData {
        ReferenceData {
            assets: vec![
                Asset {
                    ticker: "AAA".into(),
                    type_index: 0,
                },
                Asset {
                    ticker: "BBB".into(),
                    type_index: 1,
                },
                Asset {
                    ticker: "CCC".into(),
                    type_index: 1,
                },
            ],
            types: vec!["stock".into(), "crypto".into()],
            algorithms: vec![
                AlgorithmRef {
                    name: "simplema".into(),
                },
                AlgorithmRef {
                    name: "meanrev".into(),
                },
            ],
        }
    }

    fn session() -> (DashboardSession<TestDriver>, TestDriver) {
        let driver = TestDriver::default();
        let mut s = DashboardSession::new(driver.clone());
        s.load_reference(reference());
        (s, driver)
    }

    #[test]
    fn at_most_one_timer_across_interleavings() {
        let (mut s, driver) = session();
        for &i in &[0, 1, 0, 2, 2, 1, 0, 0, 1] {
            s.select_asset(i).unwrap();
            assert!(driver.live_timers.get() <= 1);
        }
        assert_eq!(driver.live_timers.get(), 1);
        s.stop_watch();
        assert_eq!(driver.live_timers.get(), 0);
        s.stop_watch();
        assert_eq!(driver.live_timers.get(), 0);
    }

    #[test]
    fn reselecting_same_asset_does_not_reset_timer() {
        let (mut s, driver) = session();
        s.select_asset(0).unwrap();
        let effect = s.select_asset(0).unwrap();
        assert!(!effect.watch_restarted);
        assert_eq!(driver.fetches.borrow().as_slice(), &[0]);
        assert_eq!(driver.timers_started.borrow().as_slice(), &[0]);
    }

    #[test]
    fn switching_away_and_back_cancels_before_restarting() {
        let (mut s, driver) = session();
        s.select_asset(0).unwrap();
        s.select_asset(1).unwrap();
        s.select_asset(0).unwrap();
        assert_eq!(driver.live_timers.get(), 1);
        assert_eq!(driver.timers_started.borrow().as_slice(), &[0, 1, 0]);
    }

    #[test]
    fn account_fetch_once_per_type() {
        let (mut s, _) = session();
        let first = s.select_asset(1).unwrap();
        assert_eq!(first.account_fetch, Some(1));
        s.resolve_account(
            1,
            AccountInfo {
                balance: 100.0,
                buying_power: 200.0,
                equity: 100.0,
            },
        );
        // BBB -> CCC both type 1: no further request.
        let second = s.select_asset(2).unwrap();
        assert_eq!(second.account_fetch, None);
        let third = s.select_asset(0).unwrap();
        assert_eq!(third.account_fetch, Some(0));
    }

    #[test]
    fn inflight_account_request_suppresses_duplicates() {
        let mut cache = AccountInfoCache::new();
        assert!(cache.ensure(1));
        assert!(!cache.ensure(1));
        cache.reject(1);
        assert!(cache.ensure(1));
        cache.resolve(
            1,
            AccountInfo {
                balance: 1.0,
                buying_power: 1.0,
                equity: 1.0,
            },
        );
        assert!(!cache.ensure(1));
        assert_eq!(cache.rendered_type(), Some(1));
    }

    #[test]
    fn failed_account_fetch_keeps_previous_info() {
        let mut cache = AccountInfoCache::new();
        assert!(cache.ensure(0));
        let info = AccountInfo {
            balance: 50.0,
            buying_power: 100.0,
            equity: 50.0,
        };
        cache.resolve(0, info);
        assert!(cache.ensure(1));
        cache.reject(1);
        assert_eq!(cache.info(), Some(info));
        assert_eq!(cache.rendered_type(), Some(0));
    }

    #[test]
    fn backtest_stops_watch() {
        let (mut s, driver) = session();
        s.select_asset(0).unwrap();
        s.select_algorithm(1).unwrap();
        assert!(s.is_watching());
        let req = s.begin_backtest().unwrap();
        assert_eq!(
            req,
            BacktestRequest {
                asset: 0,
                algorithm: 1,
            }
        );
        assert!(!s.is_watching());
        assert_eq!(driver.live_timers.get(), 0);
    }

    #[test]
    fn backtest_requires_full_selection() {
        let (mut s, _) = session();
        assert_eq!(s.begin_backtest(), Err(DashError::NoAssetSelected));
        s.select_asset(0).unwrap();
        assert_eq!(s.begin_backtest(), Err(DashError::NoAlgorithmSelected));
        // The failed attempts must not have silently stopped a live watch.
        assert!(s.is_watching());
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let (mut s, _) = session();
        s.select_asset(0).unwrap();
        s.select_asset(1).unwrap();
        assert!(!s.accepts_snapshot(0));
        assert!(s.accepts_snapshot(1));
        s.stop_watch();
        assert!(!s.accepts_snapshot(1));
    }

    #[test]
    fn filter_change_selects_first_visible() {
        let (mut s, _) = session();
        s.select_asset(0).unwrap();
        let effect = s
            .set_type_filter(AssetTypeFilter::Specific(1))
            .unwrap()
            .expect("selection moved");
        assert_eq!(effect.asset, 1);
        assert!(effect.watch_restarted);
        assert_eq!(s.selected_asset(), Some(1));
        // Back to All: asset 1 is still visible, nothing moves.
        assert_eq!(s.set_type_filter(AssetTypeFilter::All).unwrap(), None);
    }

    #[test]
    fn filter_with_no_matches_stops_watch() {
        let (mut s, driver) = session();
        s.select_asset(0).unwrap();
        let effect = s.set_type_filter(AssetTypeFilter::Specific(7)).unwrap();
        assert_eq!(effect, None);
        assert_eq!(s.selected_asset(), None);
        assert_eq!(driver.live_timers.get(), 0);
    }

    #[test]
    fn unresolved_selection_is_an_error_not_a_panic() {
        let (mut s, driver) = session();
        assert!(s.select_asset(9).is_err());
        assert!(s.select_algorithm(5).is_err());
        assert_eq!(driver.live_timers.get(), 0);
        assert_eq!(s.selected_asset(), None);
    }

    #[test]
    fn empty_algorithm_list_surfaces_on_default_selection() {
        let driver = TestDriver::default();
        let mut s = DashboardSession::new(driver.clone());
        let mut data = reference();
        data.algorithms.clear();
        s.load_reference(data);
        // The default pick must fail loudly here, not at backtest time.
        let err = s.select_algorithm(0).unwrap_err();
        assert!(matches!(err, DashError::UnresolvedReference { len: 0, .. }));
        s.select_asset(0).unwrap();
        assert_eq!(s.begin_backtest().unwrap_err(), DashError::NoAlgorithmSelected);
        // A failed backtest attempt leaves the watch running.
        assert_eq!(driver.live_timers.get(), 1);
    }
}
