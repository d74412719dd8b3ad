//! Integration tests for the sale engine driving a ledger.
//!
//! Time is explicit in every call, so each test builds its contexts from a
//! fixed deployment instant instead of the wall clock.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tessera_contracts::{ErrorKind, Ledger, Sale, SaleConfig, SalePhase};
use tessera_protocol::config::{DEFAULT_MAX_AMOUNT, DEFAULT_MIN_AMOUNT, DEFAULT_RATE, UNIT};
use tessera_protocol::{Address, CallContext, Notification};

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

struct Offering {
    issuer: Address,
    ledger: Ledger,
    sale: Sale,
}

/// Deploys a ledger and a sale (start = t0 + 1 day, 30 days long) and
/// hands ledger ownership to the sale.
fn offering(phase: SalePhase, tweak: impl FnOnce(&mut SaleConfig)) -> Offering {
    let issuer = addr("issuer");
    let mut ledger = Ledger::new(addr("ledger"), issuer).unwrap();
    let start = t0() + Duration::days(1);
    let mut config = SaleConfig::new(
        phase,
        start,
        start + Duration::days(30),
        ledger.address(),
        addr("wallet"),
    );
    tweak(&mut config);
    let sale = Sale::deploy(addr("sale"), config, &CallContext::new(issuer, t0())).unwrap();
    ledger.transfer_ownership(issuer, sale.address()).unwrap();
    Offering {
        issuer,
        ledger,
        sale,
    }
}

impl Offering {
    fn in_window(&self) -> DateTime<Utc> {
        self.sale.start_time() + Duration::hours(2)
    }

    fn buy_at(&mut self, who: &str, value: u128, now: DateTime<Utc>) -> Result<u128, ErrorKind> {
        let ctx = CallContext::new(addr(who), now).with_value(value);
        self.sale
            .buy(&mut self.ledger, &ctx)
            .map_err(|e| e.kind())
    }

    fn buy(&mut self, who: &str, value: u128) -> Result<u128, ErrorKind> {
        let now = self.in_window();
        self.buy_at(who, value, now)
    }

    fn as_issuer(&self, now: DateTime<Utc>) -> CallContext {
        CallContext::new(self.issuer, now)
    }

    fn finalise(&mut self, ctx: &CallContext) -> Result<(), ErrorKind> {
        self.sale
            .finalise(&mut self.ledger, ctx)
            .map_err(|e| e.kind())
    }
}

// ---------------------------------------------------------------------------
// Purchases
// ---------------------------------------------------------------------------

#[test]
fn purchase_window_is_enforced() {
    let mut o = offering(SalePhase::Presale, |_| {});
    let start = o.sale.start_time();
    let end = o.sale.end_time();

    assert_eq!(o.buy_at("alice", DEFAULT_MIN_AMOUNT, t0()), Err(ErrorKind::InvalidState));
    assert_eq!(
        o.buy_at("alice", DEFAULT_MIN_AMOUNT, start - Duration::seconds(1)),
        Err(ErrorKind::InvalidState)
    );

    let minted = o.buy_at("alice", DEFAULT_MIN_AMOUNT, start).unwrap();
    assert_eq!(minted, DEFAULT_MIN_AMOUNT * DEFAULT_RATE);
    assert_eq!(o.ledger.balance_of(addr("alice")), DEFAULT_MIN_AMOUNT * DEFAULT_RATE);

    assert_eq!(o.buy_at("bob", DEFAULT_MIN_AMOUNT, end), Err(ErrorKind::InvalidState));
}

#[test]
fn whitelist_lifts_the_ceiling_only() {
    let mut o = offering(SalePhase::Presale, |_| {});
    let whale = addr("whale");
    let now = o.in_window();

    assert_eq!(o.buy("whale", DEFAULT_MAX_AMOUNT + 1), Err(ErrorKind::LimitExceeded));

    o.sale.update_whitelist(&o.as_issuer(now), whale, true).unwrap();
    assert!(o.sale.is_whitelisted(whale));
    o.buy("whale", DEFAULT_MAX_AMOUNT + 1).unwrap();
    o.buy("whale", DEFAULT_MAX_AMOUNT).unwrap();
    assert_eq!(o.sale.contribution_of(whale), 2 * DEFAULT_MAX_AMOUNT + 1);

    // The minimum still applies.
    assert_eq!(o.buy("whale", DEFAULT_MIN_AMOUNT - 1), Err(ErrorKind::LimitExceeded));

    // Removing the flag restores the ceiling against the running total.
    o.sale.update_whitelist(&o.as_issuer(now), whale, false).unwrap();
    assert_eq!(o.buy("whale", DEFAULT_MIN_AMOUNT), Err(ErrorKind::LimitExceeded));

    let stranger = CallContext::new(addr("mallory"), now);
    let err = o.sale.update_whitelist(&stranger, whale, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn cap_ends_the_sale() {
    let mut o = offering(SalePhase::Presale, |c| c.cap = 10 * UNIT);
    let whale = addr("whale");
    let now = o.in_window();
    o.sale.update_whitelist(&o.as_issuer(now), whale, true).unwrap();

    o.buy("whale", 9 * UNIT).unwrap();
    assert_eq!(o.buy("alice", 2 * UNIT), Err(ErrorKind::LimitExceeded));
    assert!(!o.sale.has_ended(now));

    o.buy("alice", UNIT).unwrap();
    assert_eq!(o.sale.wei_raised(), 10 * UNIT);
    assert!(o.sale.has_ended(now));
    assert!(!o.sale.is_live(now));
    assert_eq!(o.buy("alice", UNIT), Err(ErrorKind::InvalidState));

    // Sold out: finalisation does not wait for the end time.
    let ctx = o.as_issuer(now);
    o.finalise(&ctx).unwrap();
    assert!(o.sale.is_completed());
}

#[test]
fn counters_track_mints() {
    let mut o = offering(SalePhase::Presale, |_| {});
    o.buy("alice", UNIT).unwrap();
    o.buy("bob", 2 * UNIT).unwrap();
    o.buy("alice", UNIT).unwrap();

    assert_eq!(o.sale.purchaser_count(), 2);
    assert_eq!(o.sale.wei_raised(), 4 * UNIT);
    assert_eq!(o.sale.sold_tokens(), 4 * UNIT * DEFAULT_RATE);
    assert_eq!(o.ledger.total_supply(), o.sale.sold_tokens());
    assert!(o.ledger.supply_is_consistent());

    let purchases = o
        .sale
        .notifications()
        .iter()
        .filter(|n| matches!(n, Notification::TokenPurchase { .. }))
        .count();
    assert_eq!(purchases, 3);
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[test]
fn end_time_changes() {
    let mut o = offering(SalePhase::Presale, |_| {});
    let start = o.sale.start_time();

    // Before the start, an end before the start is refused, and nothing is emitted.
    let err = o
        .sale
        .change_end_time(&o.as_issuer(t0()), start - Duration::hours(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(o.sale.notifications().is_empty());

    // Once live, pulling the end into the past ends the sale at once.
    let now = start + Duration::days(2);
    assert!(!o.sale.has_ended(now));
    let past = start + Duration::days(1);
    o.sale.change_end_time(&o.as_issuer(now), past).unwrap();
    assert!(o.sale.has_ended(now));
    assert_eq!(o.sale.end_time(), past);
    assert!(matches!(
        o.sale.notifications().last(),
        Some(Notification::EndTimeChanged { end_time }) if *end_time == past
    ));
    assert_eq!(o.buy_at("alice", UNIT, now), Err(ErrorKind::InvalidState));

    let stranger = CallContext::new(addr("mallory"), now);
    assert_eq!(
        o.sale
            .change_end_time(&stranger, start + Duration::days(10))
            .unwrap_err()
            .kind(),
        ErrorKind::Unauthorized
    );
}

#[test]
fn halted_sale_refuses_purchases_and_value() {
    let mut o = offering(SalePhase::Presale, |_| {});
    let now = o.in_window();
    o.sale.halt(&o.as_issuer(now)).unwrap();
    assert!(o.sale.is_halted());
    assert_eq!(o.buy("alice", UNIT), Err(ErrorKind::InvalidState));

    o.sale.unhalt(&o.as_issuer(now)).unwrap();
    o.buy("alice", UNIT).unwrap();

    let direct = CallContext::new(addr("alice"), now).with_value(UNIT);
    assert_eq!(o.sale.receive(&direct).unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(o.sale.wei_raised(), UNIT);
}

// ---------------------------------------------------------------------------
// Finalisation
// ---------------------------------------------------------------------------

#[test]
fn finalise_guards() {
    let mut o = offering(SalePhase::Presale, |_| {});
    let end = o.sale.end_time();

    let early = o.as_issuer(o.in_window());
    assert_eq!(o.finalise(&early), Err(ErrorKind::InvalidState));

    let stranger = CallContext::new(addr("mallory"), end);
    assert_eq!(o.finalise(&stranger), Err(ErrorKind::Unauthorized));

    let owner = o.as_issuer(end);
    o.finalise(&owner).unwrap();
    assert_eq!(o.finalise(&owner), Err(ErrorKind::InvalidState));
    // A completed sale refuses everything else too.
    assert_eq!(
        o.sale
            .change_end_time(&o.as_issuer(end), end + Duration::days(1))
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn crowdsale_cannot_finalise_before_presale() {
    let mut o = offering(SalePhase::Crowdsale, |_| {});
    let end = o.sale.end_time();
    let owner = o.as_issuer(end);
    assert_eq!(o.finalise(&owner), Err(ErrorKind::InvalidState));

    // Nothing was committed on either side.
    assert!(!o.sale.is_completed());
    assert_eq!(o.ledger.owner(), o.sale.address());
}

#[test]
fn presale_then_crowdsale() {
    let reserve = 50 * UNIT;
    let mut o = offering(SalePhase::Presale, |c| c.reserve_tokens = reserve);
    let issuer = o.issuer;
    let wallet = o.sale.config().wallet;

    o.buy("alice", UNIT).unwrap();
    let presale_end = o.sale.end_time();
    let ctx = o.as_issuer(presale_end);
    o.finalise(&ctx).unwrap();

    assert_eq!(o.ledger.owner(), issuer);
    assert_eq!(o.ledger.balance_of(wallet), reserve);
    assert!(o.ledger.minting_phase().presale_closed());
    assert!(!o.ledger.minting_finished());

    // Second round against the same ledger.
    let mut ledger = o.ledger;
    let start = presale_end + Duration::days(1);
    let config = SaleConfig::new(
        SalePhase::Crowdsale,
        start,
        start + Duration::days(10),
        ledger.address(),
        wallet,
    );
    let mut crowdsale =
        Sale::deploy(addr("crowdsale"), config, &CallContext::new(issuer, presale_end)).unwrap();
    ledger.transfer_ownership(issuer, crowdsale.address()).unwrap();

    let ctx = CallContext::new(addr("bob"), start).with_value(2 * UNIT);
    crowdsale.buy(&mut ledger, &ctx).unwrap();

    let end = crowdsale.end_time();
    crowdsale
        .finalise(&mut ledger, &CallContext::new(issuer, end))
        .unwrap();
    assert!(ledger.minting_finished());
    assert_eq!(ledger.owner(), issuer);
    assert_eq!(
        ledger.total_supply(),
        reserve + 3 * UNIT * DEFAULT_RATE
    );
    assert!(matches!(
        crowdsale.notifications().last(),
        Some(Notification::Finalised { reserve: 0, .. })
    ));
}

#[test]
fn snapshot_reports_progress() {
    let mut o = offering(SalePhase::Presale, |_| {});
    o.buy("alice", UNIT).unwrap();
    let snap = o.sale.snapshot(o.in_window());
    assert_eq!(snap.wei_raised, UNIT);
    assert_eq!(snap.purchaser_count, 1);
    assert!(!snap.has_ended);
    assert!(!snap.completed);
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["config"]["phase"], "presale");
}
