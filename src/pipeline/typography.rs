use super::{ProcessingContext, Processor};
use crate::typography::typogrify;

pub struct TypographyStage;

impl Processor for TypographyStage {
    fn name(&self) -> &'static str {
        "typography"
    }

    fn enabled(&self, ctx: &ProcessingContext) -> bool {
        ctx.options.typography
    }

    fn process(&self, html: &str, _ctx: &ProcessingContext) -> String {
        typogrify(html)
    }
}
