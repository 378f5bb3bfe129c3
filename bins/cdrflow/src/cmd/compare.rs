use tokio_util::sync::CancellationToken;

use cdrflow_engine::TopologyKind;

use crate::config::{BenchArgs, Effective};
use crate::error::CliError;

/// Run every topology in turn with the same stages and record count.
pub async fn run(args: BenchArgs) -> Result<(), CliError> {
    let eff = Effective::new(&args, None)?;
    tracing::info!(config = %args.config, iterations = eff.options.iterations, "cdrflow compare");

    let token = CancellationToken::new();
    super::cancel_on_interrupt(&token);

    let mut reports = Vec::with_capacity(TopologyKind::ALL.len());
    for kind in TopologyKind::ALL {
        match super::bench(&eff, kind, &token).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                token.cancel();
                return Err(e);
            }
        }
    }
    token.cancel();
    super::print_reports(&reports, eff.json)
}
