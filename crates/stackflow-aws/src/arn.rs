//! ARN helpers for resources whose ARN is not exposed as an attribute

use crate::lex::{Bot, BotAlias};
use stackflow_core::{StackBuilder, Value};

/// `arn:aws:lex:<region>:<account>:bot-alias/<botId>/<aliasId>`
///
/// Region and account come from the stack environment, or stay pseudo
/// parameters for environment-agnostic stacks.
pub fn lex_bot_alias_arn(builder: &StackBuilder, bot: &Bot, alias: &BotAlias) -> Value {
    Value::join(
        "",
        vec![
            Value::string("arn:aws:lex:"),
            builder.region(),
            Value::string(":"),
            builder.account(),
            Value::string(":bot-alias/"),
            bot.bot_id(),
            Value::string("/"),
            alias.alias_id(),
        ],
    )
}
