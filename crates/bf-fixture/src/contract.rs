//! The battlefield contract: every action the fixture exposes plus the
//! `onerror` recovery handler.

use std::time::Duration;

use bf_kernel::{
    ApplyContext, Call, Contract, DeferredSend, FailedDeferred, KernelError, Name, check,
};
use bf_store::{StoreError, VariantValue};

use crate::account::AccountName;
use crate::actions::{
    AccountArg, CreaOrder, Dtrx, DtrxExec, FailArg, InlineDeep, InlineEmpty, ProduceRows, SkTest,
    TwoRows, VariantArg,
};
use crate::sk;
use crate::tables::{BattlefieldTables, ChainState, MemberRow};

pub const BATTLEFIELD: &str = "battlefield1";
/// Second contract account; receives the `creaorder` notification as `n2`.
pub const BATTLEFIELD_PEER: &str = "battlefield3";
pub const NULL_ACCOUNT: &str = "eosio.null";

/// Sender id of the one deferred send `dtrx` keeps pending.
pub const DTRX_SENDER_ID: u128 = 0x1122_3344_5566_7788_1122_3344_5566_7788;

type Ctx<'a, 'b> = &'a mut ApplyContext<'b, ChainState>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Battlefield;

impl Contract<ChainState> for Battlefield {
    fn apply(&self, ctx: &mut ApplyContext<'_, ChainState>) -> Result<(), KernelError> {
        if ctx.is_notification() {
            return on_notify(ctx);
        }
        let action = ctx.action().clone();
        match action.as_str() {
            "dbins" => dbins(ctx),
            "dbinstwo" => dbinstwo(ctx),
            "dbupd" => dbupd(ctx),
            "dbrem" => dbrem(ctx),
            "dbremtwo" => dbremtwo(ctx),
            "dtrx" => dtrx(ctx),
            "dtrxcancel" => dtrxcancel(ctx),
            "dtrxexec" => dtrxexec(ctx),
            "nestdtrxexec" => nestdtrxexec(ctx),
            "nestonerror" => nestonerror(ctx),
            "creaorder" => creaorder(ctx),
            "inlineempty" => inlineempty(ctx),
            "inlinedeep" => inlinedeep(ctx),
            "varianttest" => varianttest(ctx),
            "producerows" => producerows(ctx),
            "sktest" => {
                let SkTest { action } = ctx.data_as()?;
                sk::run(tables(ctx), &action)
            }
            other => Err(KernelError::ExplicitFailure(format!(
                "unknown action {}::{other}",
                ctx.receiver()
            ))),
        }
    }
}

/// Tables of the running account.
fn tables<'c>(ctx: &'c mut ApplyContext<'_, ChainState>) -> &'c mut BattlefieldTables {
    let receiver = ctx.receiver().clone();
    ctx.state_mut().scope_mut(&receiver)
}

fn require_auth(ctx: Ctx<'_, '_>, account: AccountName) -> Result<(), KernelError> {
    let actor = account.to_name();
    check(
        ctx.call().authorization.contains(&actor),
        format!("missing authority of {actor}"),
    )
}

fn created_at(ctx: Ctx<'_, '_>) -> u32 {
    u32::try_from(ctx.now().as_secs()).unwrap_or(u32::MAX)
}

fn self_call<T: serde::Serialize>(
    ctx: Ctx<'_, '_>,
    account: impl Into<Name>,
    action: &str,
    payload: &T,
) -> Result<Call, KernelError> {
    let actor = ctx.receiver().clone();
    Ok(Call::new(account, action, payload)?.authorized_by(actor))
}

fn send_nonce(ctx: Ctx<'_, '_>, tag: &str) -> Result<(), KernelError> {
    let call = Call::new(NULL_ACCOUNT, "nonce", &tag)?;
    ctx.send_context_free_inline_as(tag, call);
    Ok(())
}

fn insert_member(
    ctx: Ctx<'_, '_>,
    id: Option<u64>,
    account: AccountName,
    memo: &str,
) -> Result<(), KernelError> {
    let created_at = created_at(ctx);
    let members = &mut tables(ctx).members;
    let build = |id| MemberRow {
        id,
        account,
        memo: memo.to_string(),
        created_at,
    };
    match id {
        Some(id) => members.insert_with_id(id, build)?,
        None => members.insert(build)?,
    };
    Ok(())
}

/// Primary key of the first member whose account is `account`.
fn member_by_account(tables: &BattlefieldTables, account: AccountName) -> Result<u64, KernelError> {
    tables
        .members
        .find_by_secondary("byaccount", account.value())?
        .map(|row| row.id)
        .ok_or_else(|| {
            KernelError::Store(StoreError::NotFound {
                table: tables.members.name().to_string(),
                lookup: format!("byaccount = {account}"),
            })
        })
}

fn dbins(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let AccountArg { account } = ctx.data_as()?;
    require_auth(ctx, account)?;
    ctx.print("dbins ran and you're authenticated");
    insert_member(
        ctx,
        Some(1),
        "dbops1".parse()?,
        "inserted billed to calling account",
    )?;
    insert_member(ctx, Some(2), "dbops2".parse()?, "inserted billed to self")
}

fn dbinstwo(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let TwoRows {
        account,
        first,
        second,
    } = ctx.data_as()?;
    require_auth(ctx, account)?;
    insert_member(
        ctx,
        Some(first),
        AccountName::from_value(first),
        "inserted billed to calling account",
    )?;
    insert_member(
        ctx,
        Some(second),
        AccountName::from_value(second),
        "inserted billed to self",
    )
}

fn dbupd(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let AccountArg { account } = ctx.data_as()?;
    require_auth(ctx, account)?;
    let tables = tables(ctx);
    let first = member_by_account(tables, "dbops1".parse()?)?;
    let second = member_by_account(tables, "dbops2".parse()?)?;
    tables
        .members
        .modify(first, |row| row.memo = "updated row 1".into())?;
    let renamed: AccountName = "dbupd".parse()?;
    tables.members.modify(second, |row| {
        row.account = renamed;
        row.memo = "updated row 2".into();
    })?;
    Ok(())
}

fn erase_by_account(ctx: Ctx<'_, '_>, accounts: [AccountName; 2]) -> Result<(), KernelError> {
    let tables = tables(ctx);
    for account in accounts {
        let id = member_by_account(tables, account)?;
        tables.members.erase(id)?;
    }
    Ok(())
}

fn dbrem(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let AccountArg { account } = ctx.data_as()?;
    require_auth(ctx, account)?;
    erase_by_account(ctx, ["dbops1".parse()?, "dbupd".parse()?])
}

fn dbremtwo(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let TwoRows {
        account,
        first,
        second,
    } = ctx.data_as()?;
    require_auth(ctx, account)?;
    erase_by_account(
        ctx,
        [AccountName::from_value(first), AccountName::from_value(second)],
    )
}

fn dtrx(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let args: Dtrx = ctx.data_as()?;
    require_auth(ctx, args.account)?;
    let exec = DtrxExec {
        account: args.account,
        fail: args.fail_later,
        fail_nested: args.fail_later_nested,
        nonce: args.nonce,
    };
    let receiver = ctx.receiver().clone();
    let call = self_call(ctx, receiver, "dtrxexec", &exec)?;
    ctx.send_deferred(
        DeferredSend::new(DTRX_SENDER_ID, call)
            .delay(Duration::from_secs(u64::from(args.delay_sec)))
            .payer(args.account.to_name())
            .replace_existing(true),
    )?;
    check(!args.fail_now, "forced fail as requested by action parameters")
}

fn dtrxcancel(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let AccountArg { account } = ctx.data_as()?;
    require_auth(ctx, account)?;
    ctx.cancel_deferred(DTRX_SENDER_ID)
}

fn dtrxexec(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let exec: DtrxExec = ctx.data_as()?;
    ctx.print("dtrxexec start console log, before failing");
    require_auth(ctx, exec.account)?;
    check(!exec.fail, "dtrxexec instructed to fail")?;
    let call = self_call(
        ctx,
        exec.account.to_name(),
        "nestdtrxexec",
        &FailArg {
            fail: exec.fail_nested,
        },
    )?;
    ctx.send_inline_as("nestdtrxexec", call);
    Ok(())
}

fn nestdtrxexec(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let FailArg { fail } = ctx.data_as()?;
    ctx.print("Nested inline within dtrxexec");
    check(!fail, "dtrxexec instructed to fail")
}

fn nestonerror(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let FailArg { fail } = ctx.data_as()?;
    ctx.print("Nested inline within onerror handler");
    insert_member(
        ctx,
        None,
        "nestonerror".parse()?,
        "from nested onerror handler",
    )?;
    check(!fail, "nestonerror instructed to fail")
}

/// Recovery handler for a failed `dtrxexec` deferred send.
///
/// Nonce `f` makes the handler itself fail; nonce `nf` adds a failing nested
/// inline next to the succeeding one.
pub fn onerror(
    ctx: &mut ApplyContext<'_, ChainState>,
    failed: &FailedDeferred,
) -> Result<(), KernelError> {
    ctx.print("Called on error handler\n");
    insert_member(ctx, None, "onerror".parse()?, "from onerror handler")?;

    let exec: DtrxExec = failed.call.data_as()?;
    ctx.print(format!("Extracted {} \n", exec.nonce));
    check(exec.nonce != "f", "onerror instructed to fail")?;
    ctx.print("Data nonce was not f\n");

    let target = exec.account.to_name();
    let deep = InlineDeep {
        tag: exec.nonce.clone(),
        n4: "notified4".parse()?,
        n5: "notified5".parse()?,
        nested_inline_tag: "i3".into(),
        nested_inline_fail: false,
        nested_cfa_inline_tag: "c3".into(),
    };
    let call = self_call(ctx, target.clone(), "inlinedeep", &deep)?;
    ctx.send_inline_as(exec.nonce.clone(), call);

    let call = self_call(ctx, target.clone(), "nestonerror", &FailArg { fail: false })?;
    ctx.send_inline_as("nestonerror", call);
    if exec.nonce == "nf" {
        let call = self_call(ctx, target, "nestonerror", &FailArg { fail: true })?;
        ctx.send_inline_as("nestonerror", call);
    }
    Ok(())
}

fn creaorder(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let order: CreaOrder = ctx.data_as()?;
    ctx.require_recipient(order.n1.to_name());

    let first_receiver = ctx.first_receiver().clone();
    let deep = InlineDeep {
        tag: "i2".into(),
        n4: order.n4,
        n5: order.n5,
        nested_inline_tag: "i3".into(),
        nested_inline_fail: false,
        nested_cfa_inline_tag: "c3".into(),
    };
    let call = self_call(ctx, first_receiver, "inlinedeep", &deep)?;
    ctx.send_inline_as("i2", call);

    ctx.require_recipient(order.n2.to_name());
    send_nonce(ctx, "c2")
}

fn on_notify(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    if ctx.action() == "creaorder" {
        return on_creaorder(ctx);
    }
    Ok(())
}

/// `creaorder` notification; only the `n2` recipient reacts.
fn on_creaorder(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let order: CreaOrder = ctx.data_as()?;
    if *ctx.receiver() != order.n2.to_name() {
        return Ok(());
    }
    let first_receiver = ctx.first_receiver().clone();
    let call = self_call(
        ctx,
        first_receiver,
        "inlineempty",
        &InlineEmpty {
            tag: "i1".into(),
            fail: false,
        },
    )?;
    ctx.send_inline_as("i1", call);
    send_nonce(ctx, "c1")?;
    ctx.require_recipient(order.n3.to_name());
    Ok(())
}

fn inlineempty(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let InlineEmpty { fail, .. } = ctx.data_as()?;
    check(!fail, "inlineempty instructed to fail")
}

fn inlinedeep(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let deep: InlineDeep = ctx.data_as()?;
    ctx.require_recipient(deep.n4.to_name());
    ctx.require_recipient(deep.n5.to_name());

    let first_receiver = ctx.first_receiver().clone();
    let call = self_call(
        ctx,
        first_receiver,
        "inlineempty",
        &InlineEmpty {
            tag: deep.nested_inline_tag.clone(),
            fail: deep.nested_inline_fail,
        },
    )?;
    ctx.send_inline_as(deep.nested_inline_tag, call);
    send_nonce(ctx, &deep.nested_cfa_inline_tag)
}

/// Creation number stamped on rows written by `varianttest`.
pub const VARIANT_TEST_SEQUENCE: u64 = 0xFF_FFFF_FF00;

fn varianttest(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let arg: VariantArg = ctx.data_as()?;
    let value = match &arg {
        VariantArg::Uint16(value) => {
            ctx.print(format!("Called uint16_t variant{value}\n"));
            VariantValue::Uint16(*value)
        }
        VariantArg::String(text) => {
            ctx.print(format!("Called string variant{text}\n"));
            VariantValue::Int32(i32::try_from(text.len()).unwrap_or(i32::MAX))
        }
    };
    tables(ctx).variants.append(VARIANT_TEST_SEQUENCE, value)?;
    Ok(())
}

/// Alternative stored for row `i` of `producerows`.
pub fn produced_variant(i: u64) -> VariantValue {
    if i % 5 == 0 {
        VariantValue::Int32(i as i32)
    } else if i % 4 == 0 {
        VariantValue::Uint32(i as u32)
    } else if i % 3 == 0 {
        VariantValue::Uint16(i as u16)
    } else if i % 2 == 0 {
        VariantValue::Int8(i as i8)
    } else {
        VariantValue::default()
    }
}

fn producerows(ctx: Ctx<'_, '_>) -> Result<(), KernelError> {
    let ProduceRows { row_count } = ctx.data_as()?;
    tables(ctx).variants.bulk_append(row_count, produced_variant)?;
    Ok(())
}
