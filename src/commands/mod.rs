pub mod decode;
pub mod diff;
pub mod refresh;
pub mod run;
pub mod types;

use crate::Context;
use crate::ui;

/// Explain a reconciliation failure; the error itself is reported by `main`
fn report_failure(ctx: &Context, err: &reconciler::Error) {
    if ctx.quiet {
        return;
    }
    let category = err.category();
    ui::hint(&format!("{category}. {}", category.advice()));
}
