//! Integration tests for the ledger's locks and role handoffs.
//!
//! These walk the ledger through the states an offering puts it in:
//! issuer minting, agent-only transfers, release, and the end of minting.

use tessera_contracts::{ErrorKind, Ledger, MintingPhase, Role};
use tessera_protocol::config::UNIT;
use tessera_protocol::{Address, Notification};

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn ledger() -> (Ledger, Address) {
    let issuer = addr("issuer");
    (Ledger::new(addr("ledger"), issuer).unwrap(), issuer)
}

// ---------------------------------------------------------------------------
// Minting
// ---------------------------------------------------------------------------

#[test]
fn minting_closes_for_good() {
    let (mut ledger, issuer) = ledger();
    let x = addr("x");

    ledger.mint(issuer, x, 100 * UNIT).unwrap();
    assert_eq!(ledger.balance_of(x), 100 * UNIT);
    assert_eq!(ledger.total_supply(), 100 * UNIT);

    ledger.finish_minting(issuer, true, true).unwrap();
    assert_eq!(ledger.minting_phase(), MintingPhase::Finished);

    for amount in [1, UNIT, 100 * UNIT] {
        let err = ledger.mint(issuer, x, amount).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    assert_eq!(ledger.total_supply(), 100 * UNIT);
}

#[test]
fn presale_flag_must_close_before_crowdsale() {
    let (mut ledger, issuer) = ledger();

    let err = ledger.finish_minting(issuer, false, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(ledger.minting_phase(), MintingPhase::Open);

    ledger.finish_minting(issuer, true, false).unwrap();
    // Still mintable between the two phases.
    ledger.mint(issuer, addr("x"), UNIT).unwrap();

    ledger.finish_minting(issuer, false, true).unwrap();
    assert!(ledger.minting_finished());
}

#[test]
fn only_owner_mints() {
    let (mut ledger, issuer) = ledger();
    let stranger = addr("stranger");

    let err = ledger.mint(stranger, stranger, UNIT).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    ledger.transfer_ownership(issuer, stranger).unwrap();
    ledger.mint(stranger, stranger, UNIT).unwrap();
    assert_eq!(
        ledger.mint(issuer, issuer, UNIT).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
}

// ---------------------------------------------------------------------------
// Transfer lock
// ---------------------------------------------------------------------------

#[test]
fn transfers_locked_until_release() {
    let (mut ledger, issuer) = ledger();
    let alice = addr("alice");
    let bob = addr("bob");
    let agent = addr("release-agent");

    ledger.mint(issuer, alice, 10 * UNIT).unwrap();
    assert_eq!(
        ledger.transfer(alice, bob, UNIT).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );

    // Transfer agents move balance before release.
    ledger.set_transfer_agent(issuer, alice, true).unwrap();
    ledger.transfer(alice, bob, UNIT).unwrap();
    assert_eq!(
        ledger.transfer(bob, alice, UNIT).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );

    ledger.set_release_agent(issuer, agent).unwrap();
    assert_eq!(
        ledger.release_token_transfer(issuer).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    ledger.release_token_transfer(agent).unwrap();
    assert!(ledger.is_released());

    ledger.transfer(bob, alice, UNIT).unwrap();
    assert_eq!(ledger.balance_of(alice), 10 * UNIT);
    assert_eq!(ledger.balance_of(bob), 0);

    // Release is one-way and the agent is frozen afterwards.
    assert_eq!(
        ledger.release_token_transfer(agent).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        ledger.set_release_agent(issuer, addr("other")).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn delegated_transfer_spends_allowance() {
    let (mut ledger, issuer) = ledger();
    let alice = addr("alice");
    let spender = addr("spender");
    let carol = addr("carol");

    ledger.mint(issuer, alice, 5 * UNIT).unwrap();
    ledger.set_release_agent(issuer, issuer).unwrap();
    ledger.release_token_transfer(issuer).unwrap();

    ledger.approve(alice, spender, 2 * UNIT).unwrap();
    ledger.transfer_from(spender, alice, carol, UNIT).unwrap();
    assert_eq!(ledger.allowance(alice, spender), UNIT);

    let err = ledger
        .transfer_from(spender, alice, carol, 2 * UNIT)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

    ledger.increase_allowance(alice, spender, UNIT).unwrap();
    ledger.decrease_allowance(alice, spender, 2 * UNIT).unwrap();
    assert_eq!(ledger.allowance(alice, spender), 0);
    assert_eq!(
        ledger.decrease_allowance(alice, spender, 1).unwrap_err().kind(),
        ErrorKind::InsufficientBalance
    );
    assert!(ledger.supply_is_consistent());
}

#[test]
fn overdraft_changes_nothing() {
    let (mut ledger, issuer) = ledger();
    let alice = addr("alice");
    ledger.mint(issuer, alice, UNIT).unwrap();
    ledger.set_transfer_agent(issuer, alice, true).unwrap();
    let before = ledger.snapshot();
    let journal_len = ledger.notifications().len();

    let err = ledger.transfer(alice, addr("bob"), UNIT + 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(ledger.snapshot(), before);
    assert_eq!(ledger.notifications().len(), journal_len);
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[test]
fn board_rotation() {
    let (mut ledger, issuer) = ledger();
    let board = addr("board");

    ledger.change_board_address(issuer, board).unwrap();
    assert_eq!(ledger.access().board(), board);
    assert_eq!(
        ledger.change_board_address(issuer, issuer).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    assert_eq!(
        ledger.change_board_address(board, board).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert!(matches!(
        ledger.notifications().last(),
        Some(Notification::BoardChanged { .. })
    ));
}

#[test]
fn role_names_render() {
    assert_eq!(Role::UpgradeMaster.to_string(), "upgrade master");
}

#[test]
fn snapshot_serializes() {
    let (mut ledger, issuer) = ledger();
    ledger.mint(issuer, addr("alice"), UNIT).unwrap();
    let json = serde_json::to_value(ledger.snapshot()).unwrap();
    assert_eq!(json["decimals"], 18);
    assert_eq!(json["owner"], issuer.to_hex());
}
