use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use typed_actors::{metrics, ActorHandle, Runner, RuntimeConfig, Signal, SupervisionStrategy};

// ============================================================================
// Demo
// ============================================================================
//
// 1. A counter receives 100 increments and reports its total.
// 2. A parent spawns a worker; the worker fails on bad input and is
//    restarted, then the parent's shutdown cascades to it.
//
// ============================================================================

struct Counter {
    count: u64,
}

struct Supervisor {
    worker: ActorHandle<Worker>,
}

struct Worker {
    processed: Vec<i64>,
}

fn counter_demo(runner: &Runner) -> anyhow::Result<()> {
    let counter = ActorHandle::<Counter>::named("counter");
    counter.behavior(|_| Counter { count: 0 })?;

    runner.run([counter.erase()], |ctx| {
        for _ in 0..100 {
            ctx.post_to(&counter, |c, _| {
                c.count += 1;
                Ok(())
            })?;
        }
        ctx.post_to(&counter, |c, ctx| {
            tracing::info!(count = c.count, "Counter total");
            ctx.shutdown()?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn cascade_demo(runner: &Runner) -> anyhow::Result<()> {
    let supervisor = ActorHandle::<Supervisor>::named("supervisor");
    supervisor.behavior(|ctx| {
        let worker = ActorHandle::<Worker>::named("worker");
        let configured = worker
            .behavior(|_| Worker { processed: Vec::new() })
            .and_then(|()| worker.supervise(SupervisionStrategy::restart(3)))
            .and_then(|()| {
                worker.on_signal(|signal, ctx| {
                    if let Signal::Shutdown = signal {
                        tracing::info!(actor = %ctx.actor_name(), "Worker shutting down with its parent");
                    }
                    Ok(())
                })
            });
        if let Err(e) = configured {
            tracing::error!(error = %e, "Failed to configure worker");
        } else if let Err(e) = ctx.spawn(&worker) {
            tracing::error!(error = %e, "Failed to spawn worker");
        }
        Supervisor { worker }
    })?;
    supervisor.on_signal(|signal, ctx| {
        tracing::info!(actor = %ctx.actor_name(), signal = %signal, "Supervisor signalled");
        Ok(())
    })?;

    runner.run([supervisor.erase()], |ctx| {
        ctx.post_to(&supervisor, |s, ctx| {
            for value in [3, -1, 4, 5] {
                ctx.post_to(&s.worker, move |w, ctx| {
                    if value < 0 {
                        return Err(ctx.panic(anyhow::anyhow!("negative input {value}")));
                    }
                    w.processed.push(value);
                    tracing::info!(processed = ?w.processed, "Worker processed value");
                    Ok(())
                })?;
            }
            ctx.shutdown()?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,typed_actors=debug")))
        .init();

    tracing::info!("Starting typed actor demo");
    let runner = Runner::with_config(RuntimeConfig::compact());

    counter_demo(&runner)?;
    cascade_demo(&runner)?;

    println!("{}", metrics::global().render()?);
    Ok(())
}
