//! Property tests over engine-level invariants.

use std::collections::BTreeMap;

use bazaar_core::{Currency, Money};
use bazaar_engine::ErrorKind;
use bazaar_integration_tests::{config_with_free_tier, Fixture};
use bazaar_ledger::{WithdrawalDecision, WithdrawalMethod};
use bazaar_market::BidStatus;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum LedgerOp {
    Request(u64),
    Complete(usize),
    Reject(usize),
}

fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        (1u64..=40_000).prop_map(LedgerOp::Request),
        (0usize..8).prop_map(LedgerOp::Complete),
        (0usize..8).prop_map(LedgerOp::Reject),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn order_split_always_sums(price_minor in 1u64..10_000_000, fee_bps in 0u32..=10_000) {
        let f = Fixture::with_config(config_with_free_tier(10, fee_bps));
        let seller = f.account("seller");
        let buyer = f.account("buyer");
        let service = f.service(seller, Money::from_minor(price_minor, Currency::USD));
        let order = f.order_service(buyer, service);

        prop_assert_eq!(order.platform_fee.checked_add(order.seller_earning).expect("sum"), order.amount);
        prop_assert!(order.platform_fee.amount <= order.amount.amount);
    }

    #[test]
    fn withdrawals_conserve_earnings(ops in proptest::collection::vec(ledger_op(), 1..24)) {
        let f = Fixture::with_config(config_with_free_tier(10, 0));
        let seller = f.earning_account("seller", f.usd(1_000));
        let earned = f.usd(1_000);
        let mut requests = Vec::new();

        for op in ops {
            match op {
                LedgerOp::Request(minor) => {
                    let result = f.market.request_withdrawal(
                        seller,
                        seller,
                        Money::from_minor(minor, Currency::USD),
                        WithdrawalMethod::Paypal,
                        BTreeMap::new(),
                    );
                    match result {
                        Ok(request) => requests.push(request.id),
                        Err(e) => prop_assert!(matches!(
                            e.kind(),
                            ErrorKind::InvalidAmount | ErrorKind::InsufficientBalance
                        )),
                    }
                }
                LedgerOp::Complete(_) | LedgerOp::Reject(_) if requests.is_empty() => {}
                LedgerOp::Complete(i) => {
                    let id = requests[i % requests.len()];
                    let decision = WithdrawalDecision::Completed {
                        transaction_reference: format!("tx-{i}"),
                    };
                    if let Err(e) = f.market.resolve_withdrawal(f.admin, seller, id, decision) {
                        prop_assert_eq!(e.kind(), ErrorKind::NotFound);
                    }
                }
                LedgerOp::Reject(i) => {
                    let id = requests[i % requests.len()];
                    let decision = WithdrawalDecision::Rejected {
                        reason: "details".to_string(),
                    };
                    if let Err(e) = f.market.resolve_withdrawal(f.admin, seller, id, decision) {
                        prop_assert_eq!(e.kind(), ErrorKind::NotFound);
                    }
                }
            }

            let wallet = f.read_account(seller).wallet;
            let total = wallet
                .available
                .checked_add(wallet.pending_withdrawal)
                .and_then(|sum| sum.checked_add(wallet.lifetime_withdrawn))
                .expect("sum");
            prop_assert_eq!(total, earned);
        }
    }

    #[test]
    fn award_accepts_exactly_one(bidders in 1usize..8, pick in 0usize..8, withdrawn in 0usize..8) {
        let f = Fixture::new();
        let client = f.account("client");
        let project = f.open_project(client);
        let mut bids = Vec::new();
        for i in 0..bidders {
            let bidder = f.account(&format!("bidder-{i}"));
            bids.push((bidder, f.bid(bidder, project, 200 + i as u64)));
        }
        let winner = pick % bidders;
        let dropped = withdrawn % bidders;
        if dropped != winner {
            let (bidder, bid) = bids[dropped];
            f.market.withdraw_bid(bidder, bid).expect("withdraw");
        }

        f.market.award_project(client, project, bids[winner].1).expect("award");

        let listed = f.market.list_bids(client, project).expect("bids");
        let accepted: Vec<_> = listed.iter().filter(|b| b.status == BidStatus::Accepted).collect();
        prop_assert_eq!(accepted.len(), 1);
        prop_assert_eq!(accepted[0].id, bids[winner].1);
        prop_assert!(listed
            .iter()
            .filter(|b| b.id != bids[winner].1)
            .all(|b| matches!(b.status, BidStatus::Rejected | BidStatus::Withdrawn)));
    }
}
