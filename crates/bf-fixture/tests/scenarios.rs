use anyhow::Result;
use bf_fixture::actions::{DtrxExec, ProduceRows};
use bf_fixture::{
    AccountName, BATTLEFIELD, FixtureError, ScenarioReport, find, fixture_kernel, scenarios,
};
use bf_kernel::{Call, FaultKind, JournalRecord, KernelConfig, PassOrigin, TraceStatus};
use bf_store::VariantValue;

fn run(name: &str) -> Result<ScenarioReport> {
    Ok(find(name)?.run()?)
}

fn committed(report: &ScenarioReport) -> Vec<bool> {
    report.receipts.iter().map(|r| r.is_committed()).collect()
}

fn member_accounts(report: &ScenarioReport) -> Vec<String> {
    report.state.scopes[BATTLEFIELD]
        .members
        .iter()
        .map(|row| row.account.to_string())
        .collect()
}

#[test]
fn creaorder_runs_in_canonical_order() -> Result<()> {
    let report = run("creaorder")?;
    assert_eq!(report.receipts.len(), 1);
    let receipt = &report.receipts[0];
    assert!(receipt.is_committed(), "{:?}", receipt.status);
    assert_eq!(
        receipt.execution_order(),
        [
            "battlefield1",
            "notified1",
            "battlefield3",
            "notified3",
            "c2",
            "c1",
            "i2",
            "notified4",
            "notified5",
            "c3",
            "i3",
            "i1"
        ]
    );
    let statuses: Vec<_> = receipt.traces.iter().map(|t| t.status).collect();
    assert_eq!(statuses[1], TraceStatus::Inert);
    assert_eq!(statuses[2], TraceStatus::Executed);
    assert_eq!(statuses[4], TraceStatus::Inert);
    Ok(())
}

#[test]
fn contract_and_scripted_trees_share_ordinals() -> Result<()> {
    let ordinals = |report: &ScenarioReport| -> Vec<(u32, u32, u32)> {
        report.receipts[0]
            .traces
            .iter()
            .map(|t| {
                (
                    t.creation_ordinal,
                    t.creator_ordinal,
                    t.closest_unnotified_ancestor_ordinal,
                )
            })
            .collect()
    };
    let contract = run("creaorder")?;
    let scripted = run("scripted-order")?;
    assert_eq!(ordinals(&contract), ordinals(&scripted));

    let i1 = contract.receipts[0].trace_named("i1").expect("i1 trace");
    assert_eq!((i1.creation_ordinal, i1.creator_ordinal), (6, 4));
    assert_eq!(i1.closest_unnotified_ancestor_ordinal, 1);
    Ok(())
}

#[test]
fn db_ops_leave_the_second_insert_pair() -> Result<()> {
    let report = run("db-ops")?;
    assert_eq!(
        committed(&report),
        [false, true, false, true, true, true, false]
    );
    assert_eq!(
        report.receipts[0].fault(),
        Some((FaultKind::ExplicitFailure, "missing authority of battlefield1"))
    );
    assert_eq!(
        report.receipts[2].fault().map(|(fault, _)| fault),
        Some(FaultKind::ConstraintViolation)
    );
    assert_eq!(
        report.receipts[6].fault().map(|(fault, _)| fault),
        Some(FaultKind::NotFound)
    );
    assert_eq!(
        report.receipts[1].console(),
        "dbins ran and you're authenticated"
    );

    let members = &report.state.scopes[BATTLEFIELD].members;
    let ids: Vec<_> = members.iter().map(|row| row.id).collect();
    assert_eq!(ids, [3, 4]);
    assert_eq!(members[0].account, AccountName::from_value(3));
    assert_eq!(members[1].memo, "inserted billed to self");
    Ok(())
}

#[test]
fn variant_rows_keep_their_alternative() -> Result<()> {
    let report = run("variants")?;
    assert!(report.receipts.iter().all(|r| r.is_committed()));
    assert_eq!(report.receipts[0].console(), "Called uint16_t variant12\n");
    assert_eq!(report.receipts[1].console(), "Called string varianthello\n");

    let rows = &report.state.scopes[BATTLEFIELD].variant;
    assert_eq!(rows.len(), 14);
    assert_eq!(rows[0].variant, VariantValue::Uint16(12));
    assert_eq!(rows[0].sequence, 0xFF_FFFF_FF00);
    assert_eq!(rows[1].variant, VariantValue::Int32(5));
    let produced: Vec<_> = rows[2..].iter().map(|row| row.variant).collect();
    assert_eq!(produced[0], VariantValue::Int32(0));
    assert_eq!(produced[1], VariantValue::Int8(0));
    assert_eq!(produced[2], VariantValue::Int8(2));
    assert_eq!(produced[3], VariantValue::Uint16(3));
    assert_eq!(produced[8], VariantValue::Uint32(8));
    assert_eq!(produced[10], VariantValue::Int32(10));
    assert!(rows[2..].iter().enumerate().all(|(i, row)| row.sequence == i as u64));
    Ok(())
}

#[test]
fn oversized_producerows_aborts_its_pass() -> Result<()> {
    let mut kernel = fixture_kernel(KernelConfig::default());
    let rows = |row_count| -> Result<Call> {
        Ok(Call::new(BATTLEFIELD, "producerows", &ProduceRows { row_count })?
            .authorized_by(BATTLEFIELD))
    };
    kernel.push_action(rows(3)?)?;
    let receipt = kernel.push_action(rows(u64::MAX)?)?;
    assert_eq!(
        receipt.fault().map(|(fault, _)| fault),
        Some(FaultKind::ConstraintViolation)
    );
    let Some(scope) = kernel.state().scope(&BATTLEFIELD.into()) else {
        anyhow::bail!("battlefield scope missing");
    };
    assert_eq!(scope.variants.len(), 3);
    Ok(())
}

#[test]
fn sktest_sequence_then_reinsert() -> Result<()> {
    let report = run("sktest")?;
    assert_eq!(committed(&report), [true, true, true, true, true, false]);
    assert_eq!(
        report.receipts[5].fault(),
        Some((
            FaultKind::ExplicitFailure,
            "The action must be one of insert, update.ot, update.sk or remove"
        ))
    );
    let scope = &report.state.scopes[BATTLEFIELD];
    assert_eq!(scope.sk_i64.len(), 1);
    assert_eq!(scope.sk_i64[0].id, 1);
    assert_eq!(scope.sk_i64[0].i64, 2);
    assert_eq!(scope.sk_multi[0].d64, 1.0 + 3.1);
    Ok(())
}

#[test]
fn dtrx_exec_runs_nested_inline() -> Result<()> {
    let report = run("dtrx-exec")?;
    assert_eq!(committed(&report), [true, true]);
    let deferred = &report.receipts[1];
    assert!(matches!(deferred.origin, PassOrigin::Deferred { .. }));
    assert_eq!(deferred.execution_order(), ["battlefield1", "nestdtrxexec"]);
    assert_eq!(
        deferred.console(),
        "dtrxexec start console log, before failingNested inline within dtrxexec"
    );
    assert!(report.pending_deferred.is_empty());
    Ok(())
}

#[test]
fn dtrx_onerror_recovers_nf_and_rolls_back_f() -> Result<()> {
    let report = run("dtrx-onerror")?;
    assert_eq!(
        committed(&report),
        [true, false, true, true, true, false, true, false, false]
    );
    let recovery = &report.receipts[2];
    assert!(matches!(recovery.origin, PassOrigin::Recovery { .. }));
    assert_eq!(
        recovery.console(),
        "Called on error handler\nExtracted nf \nData nonce was not f\n"
    );
    assert_eq!(
        report.receipts[3].execution_order(),
        ["nf", "notified4", "notified5", "c3", "i3"]
    );
    assert_eq!(
        report.receipts[5].fault(),
        Some((FaultKind::ExplicitFailure, "nestonerror instructed to fail"))
    );
    assert_eq!(
        report.receipts[8].fault(),
        Some((FaultKind::ExplicitFailure, "onerror instructed to fail"))
    );
    assert_eq!(member_accounts(&report), ["onerror", "nestonerror"]);

    let recoveries = report
        .journal
        .iter()
        .filter(|record| matches!(record, JournalRecord::RecoveryInvoked(_)))
        .count();
    assert_eq!(recoveries, 2);
    Ok(())
}

#[test]
fn failing_nested_inline_fails_the_deferred_pass() -> Result<()> {
    let report = run("dtrx-nested-fail")?;
    assert_eq!(committed(&report), [true, false, true, true, true]);
    assert_eq!(
        report.receipts[1].fault(),
        Some((FaultKind::ExplicitFailure, "dtrxexec instructed to fail"))
    );
    assert_eq!(report.receipts[1].execution_order(), ["battlefield1", "nestdtrxexec"]);
    assert_eq!(member_accounts(&report), ["onerror", "nestonerror"]);
    Ok(())
}

#[test]
fn cancel_then_cancel_again() -> Result<()> {
    let report = run("dtrx-cancel")?;
    assert_eq!(committed(&report), [true, true, false]);
    assert_eq!(
        report.receipts[2].fault().map(|(fault, _)| fault),
        Some(FaultKind::NotFound)
    );
    assert!(report.pending_deferred.is_empty());
    Ok(())
}

#[test]
fn second_dtrx_replaces_the_pending_send() -> Result<()> {
    let report = run("dtrx-replace")?;
    assert_eq!(committed(&report), [true, true, true]);
    let exec: DtrxExec = report.receipts[2].traces[0].call.data_as()?;
    assert_eq!(exec.nonce, "second");
    let replaced: Vec<_> = report
        .journal
        .iter()
        .filter_map(|record| match record {
            JournalRecord::DeferredRegistered(registered) => Some(registered.replaced),
            _ => None,
        })
        .collect();
    assert_eq!(replaced, [false, true]);
    Ok(())
}

#[test]
fn failing_declaration_schedules_nothing() -> Result<()> {
    let report = run("dtrx-fail-now")?;
    assert_eq!(committed(&report), [false]);
    assert_eq!(
        report.receipts[0].fault(),
        Some((
            FaultKind::ExplicitFailure,
            "forced fail as requested by action parameters"
        ))
    );
    assert!(
        !report
            .journal
            .iter()
            .any(|record| matches!(record, JournalRecord::DeferredRegistered(_)))
    );
    Ok(())
}

#[test]
fn reports_are_reproducible() -> Result<()> {
    for scenario in scenarios() {
        let first = serde_json::to_value(scenario.run()?)?;
        let second = serde_json::to_value(scenario.run()?)?;
        assert_eq!(first, second, "{} is not deterministic", scenario.name);
    }
    Ok(())
}

#[test]
fn unknown_scenario_is_reported() {
    assert!(matches!(
        find("no-such-scenario"),
        Err(FixtureError::UnknownScenario(name)) if name == "no-such-scenario"
    ));
}
