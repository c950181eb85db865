use winnow::combinator::{cut_err, opt, preceded};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

/// A condition key split into its field and optional transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConditionKey<'i> {
    pub field: &'i str,
    pub transform: Option<&'i str>,
}

fn segment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c != '.').parse_next(input)
}

pub(crate) fn condition_key<'i>(input: &mut &'i str) -> ModalResult<ConditionKey<'i>> {
    let field = segment
        .context(StrContext::Expected(StrContextValue::Description(
            "field name",
        )))
        .parse_next(input)?;
    let transform = opt(preceded(
        '.',
        cut_err(segment).context(StrContext::Expected(StrContextValue::Description(
            "transform name",
        ))),
    ))
    .parse_next(input)?;
    Ok(ConditionKey { field, transform })
}
