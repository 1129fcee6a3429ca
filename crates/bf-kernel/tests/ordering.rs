use anyhow::Result;
use bf_kernel::{
    ApplyContext, Call, Kernel, KernelConfig, KernelError, NodeKind, TraceStatus, TreeBuilder,
    TreeSpec,
};

fn five_children() -> TreeSpec {
    TreeBuilder::root("root")
        .notify("n1")
        .inline("i2", |b| {
            b.notify("n4")
                .notify("n5")
                .inline("i3", |b| b)
                .context_free("c3")
        })
        .notify_with("n2", |b| b.inline("i1", |b| b).context_free("c1").notify("n3"))
        .context_free("c2")
        .build()
}

#[test]
fn canonical_execution_order() -> Result<()> {
    let mut kernel = Kernel::builder(()).build();
    let receipt = kernel.dispatch_tree(five_children())?;
    assert!(receipt.is_committed());
    assert_eq!(
        receipt.execution_order(),
        ["root", "n1", "n2", "n3", "c2", "c1", "i2", "n4", "n5", "c3", "i3", "i1"]
    );
    assert_eq!(
        receipt.tree.creation_order(),
        ["root", "n1", "i2", "n2", "c2", "i1", "c1", "n3", "n4", "n5", "i3", "c3"]
    );
    Ok(())
}

#[test]
fn ordinals_follow_creation_and_context() -> Result<()> {
    let mut kernel = Kernel::builder(()).build();
    let receipt = kernel.dispatch_tree(five_children())?;

    let root = receipt.trace_named("root").expect("root trace");
    assert_eq!((root.creation_ordinal, root.creator_ordinal), (1, 0));
    assert_eq!(root.closest_unnotified_ancestor_ordinal, 0);

    // i1 is declared by the n2 notification but belongs to the root context.
    let i1 = receipt.trace_named("i1").expect("i1 trace");
    assert_eq!(i1.creation_ordinal, 6);
    assert_eq!(i1.creator_ordinal, 4);
    assert_eq!(i1.closest_unnotified_ancestor_ordinal, 1);
    assert_eq!(i1.execution_index, 11);

    let n4 = receipt.trace_named("n4").expect("n4 trace");
    assert_eq!(n4.kind, NodeKind::Notification);
    assert_eq!(n4.creator_ordinal, 3);
    assert_eq!(n4.closest_unnotified_ancestor_ordinal, 3);

    let i3 = receipt.trace_named("i3").expect("i3 trace");
    assert_eq!(i3.closest_unnotified_ancestor_ordinal, 3);

    let c2 = receipt.trace_named("c2").expect("c2 trace");
    assert_eq!(c2.status, TraceStatus::Inert);
    assert!(c2.call.authorization.is_empty());
    Ok(())
}

#[test]
fn failure_late_in_the_pass_discards_earlier_work() -> Result<()> {
    #[derive(Debug, Clone, Default)]
    struct Log(Vec<String>);

    fn writer(ctx: &mut ApplyContext<'_, Log>) -> Result<(), KernelError> {
        match ctx.action().as_str() {
            "start" => {
                ctx.state_mut().0.push("start".into());
                ctx.require_recipient("watcher");
                ctx.send_inline(Call::bare("writer", "second"));
                ctx.send_inline(Call::bare("writer", "explode"));
                Ok(())
            }
            "second" => {
                ctx.state_mut().0.push("second".into());
                Ok(())
            }
            _ => Err(KernelError::ExplicitFailure("explode instructed to fail".into())),
        }
    }

    fn watcher(ctx: &mut ApplyContext<'_, Log>) -> Result<(), KernelError> {
        let line = format!("watcher saw {}", ctx.first_receiver());
        ctx.state_mut().0.push(line);
        Ok(())
    }

    let mut kernel = Kernel::builder(Log::default())
        .with_contract("writer", writer)
        .with_contract("watcher", watcher)
        .build();
    let receipt = kernel.push_action(Call::bare("writer", "start"))?;
    assert!(!receipt.is_committed());
    assert_eq!(
        receipt.execution_order(),
        ["writer", "watcher", "writer", "writer"]
    );
    assert_eq!(receipt.traces[3].status, TraceStatus::Failed);
    assert!(kernel.state().0.is_empty());
    Ok(())
}

#[test]
fn repeated_notification_runs_once_per_context() -> Result<()> {
    fn noisy(ctx: &mut ApplyContext<'_, ()>) -> Result<(), KernelError> {
        if !ctx.is_notification() {
            ctx.require_recipient("n1");
            ctx.require_recipient("n1");
            ctx.require_recipient("noisy");
        }
        Ok(())
    }

    let mut kernel = Kernel::builder(()).with_contract("noisy", noisy).build();
    let receipt = kernel.push_action(Call::bare("noisy", "go"))?;
    assert_eq!(receipt.execution_order(), ["noisy", "n1"]);
    assert_eq!(receipt.traces[1].status, TraceStatus::Inert);

    let mut loose = Kernel::builder(())
        .with_config(KernelConfig {
            dedupe_notifications: false,
            ..KernelConfig::default()
        })
        .with_contract("noisy", noisy)
        .build();
    let receipt = loose.push_action(Call::bare("noisy", "go"))?;
    assert_eq!(receipt.execution_order(), ["noisy", "n1", "n1", "noisy"]);
    Ok(())
}

#[test]
fn failing_inline_names_the_node() -> Result<()> {
    let spec = TreeBuilder::root("root")
        .notify("n1")
        .inline("i1", |b| b.notify("n2").fail())
        .inline("i2", |b| b)
        .build();
    let mut kernel = Kernel::builder(()).build();
    let receipt = kernel.dispatch_tree(spec)?;
    let (_, message) = receipt.fault().expect("aborted");
    assert_eq!(message, "i1 instructed to fail");
    assert_eq!(receipt.execution_order(), ["root", "n1", "i1"]);
    Ok(())
}
