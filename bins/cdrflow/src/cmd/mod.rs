pub mod compare;
pub mod run;

use std::io::Write;

use tokio_util::sync::CancellationToken;

use cdrflow_api::CallRecord;
use cdrflow_bench::{BenchReport, run_benchmark, run_benchmark_with_sink};
use cdrflow_engine::TopologyKind;

use crate::config::Effective;
use crate::error::CliError;

/// Cancel `token` on the first Ctrl+C.
pub fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => {
                    tracing::warn!("interrupt received, cancelling run");
                    token.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl+C"),
            },
        }
    });
}

/// Build and measure one topology with the effective configuration.
pub async fn bench(eff: &Effective, kind: TopologyKind, token: &CancellationToken) -> Result<BenchReport, CliError> {
    let topology = eff.topologies.build(kind)?;

    if !eff.print_records {
        return Ok(run_benchmark(topology.as_ref(), &eff.stages, &eff.options, token).await?);
    }

    let stdout = std::io::stdout();
    let sink = |record: &CallRecord| print_record(&mut stdout.lock(), record);
    let report = run_benchmark_with_sink(topology.as_ref(), &eff.stages, &eff.options, token, sink).await?;
    println!(
        "processed {} records through {} in {:.1} ms",
        report.iterations,
        report.topology,
        report.elapsed.as_secs_f64() * 1000.0
    );
    Ok(report)
}

fn print_record(out: &mut impl Write, record: &CallRecord) {
    let written = serde_json::to_string(record)
        .map_err(std::io::Error::from)
        .and_then(|line| writeln!(out, "{line}"));
    if let Err(e) = written {
        tracing::warn!(call_id = %record.call_id, error = %e, "cannot print record");
    }
}

pub fn print_reports(reports: &[BenchReport], json: bool) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if json {
        for report in reports {
            writeln!(out, "{}", serde_json::to_string(report)?)?;
        }
    } else {
        writeln!(out, "{}", BenchReport::table_header())?;
        for report in reports {
            writeln!(out, "{report}")?;
        }
    }
    Ok(())
}
