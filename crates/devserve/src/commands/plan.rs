//! `devserve plan`: show which pipeline stages would run.

use crate::cli::ProjectArgs;
use crate::commands::load_configuration;
use crate::error::Result;
use crate::features::select_plan;
use crate::ui;

pub async fn execute(args: ProjectArgs) -> Result<()> {
    let config = load_configuration(&args)?;

    // Only the built-in SSR hook can be configured from the command line.
    let flags = config.feature_flags(false, false);
    let plan = select_plan(&flags);

    ui::info(&format!("Middleware plan for {}:", config.app_name));
    for (index, feature) in plan.features().iter().enumerate() {
        ui::field(&format!("{:>2}.", index + 1), feature.as_str());
    }

    if flags.server_side_render {
        for violation in plan.ordering_violations() {
            ui::warning(&violation);
        }
    }
    Ok(())
}
