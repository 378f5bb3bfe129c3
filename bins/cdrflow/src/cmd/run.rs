use tokio_util::sync::CancellationToken;

use crate::config::{Effective, RunArgs};
use crate::error::CliError;

pub async fn run(args: RunArgs) -> Result<(), CliError> {
    let eff = Effective::new(&args.bench, args.topology)?;
    tracing::info!(
        config = %args.bench.config,
        topology = %eff.topology,
        iterations = eff.options.iterations,
        "cdrflow run"
    );

    let token = CancellationToken::new();
    super::cancel_on_interrupt(&token);

    let report = super::bench(&eff, eff.topology, &token).await;
    token.cancel();
    super::print_reports(&[report?], eff.json)
}
