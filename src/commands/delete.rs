use crate::api::Mode;
use crate::args::DeleteArgs;
use crate::commands::{describe, open_engine, Out, Recorded, SyncOptions};
use crate::{Config, Result};

/// Deletes an expense by id.
pub async fn delete(
    config: Config,
    mode: Mode,
    options: &SyncOptions,
    args: DeleteArgs,
) -> Result<Out<Recorded<String>>> {
    let engine = open_engine(&config, mode, options).await?;
    let outcome = engine.delete(&args.id).await?;
    engine.shutdown();
    Ok(Out::new(
        describe("Deleted", &args.id, &outcome),
        Recorded {
            record: args.id,
            outcome,
        },
    ))
}
