//! GraphQL scalar helpers.

use std::{fmt, marker::PhantomData, str::FromStr};

use juniper::{
    GraphQLType, InputValue, ParseScalarResult, ParseScalarValue, ScalarToken,
    ScalarValue, Value,
};

/// Helper type to use in `#[graphql(with = ..)]` attribute of newtypes over
/// domain values having a textual representation, like reference numbers or
/// pricing units.
///
/// Uses [`FromStr`]/[`Display`] impls of `As` type to convert the target type
/// to/from GraphQL scalar, so the domain validation applies to inputs.
///
/// Target type must implement [`TryFrom`] and [`AsRef`] for `As` type.
///
/// [`Display`]: fmt::Display
#[derive(Debug)]
pub struct Via<As>(PhantomData<As>);

impl<As> Via<As> {
    /// Converts the target type into scalar [`Value`] by using [`Display`]
    /// impl of `As` type.
    ///
    /// [`Display`]: fmt::Display
    pub fn to_output<T, S>(value: &T) -> Value<S>
    where
        As: fmt::Display,
        T: AsRef<As>,
        S: ScalarValue,
    {
        Value::from(value.as_ref().to_string())
    }

    /// Constructs the target type from scalar [`Value`] by using [`FromStr`]
    /// impl of `As` type.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the input value is not a string;
    /// - the input value cannot be parsed into `As` type;
    /// - the parsed value cannot be converted into the target type.
    pub fn from_input<T, S>(input: &InputValue<S>) -> Result<T, String>
    where
        As: FromStr,
        As::Err: fmt::Display,
        T: TryFrom<As> + GraphQLType<S, TypeInfo = ()>,
        T::Error: fmt::Display,
        S: ScalarValue,
    {
        let name = T::name(&())
            .map_or_else(|| "scalar".to_owned(), |n| n.to_string());

        let s = input.as_string_value().ok_or_else(|| {
            format!(
                "Cannot parse input scalar `{name}`: expected string input \
                 value, found: {input}",
            )
        })?;
        let parsed = s.parse::<As>().map_err(|e| {
            format!("Cannot parse input scalar `{name}` from \"{s}\": {e}")
        })?;
        T::try_from(parsed)
            .map_err(|e| format!("Cannot parse input scalar `{name}`: {e}"))
    }

    /// Parses the provided [`ScalarToken`].
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be parsed as [`String`].
    pub fn parse_token<S: ScalarValue>(
        value: ScalarToken<'_>,
    ) -> ParseScalarResult<S> {
        <String as ParseScalarValue<S>>::from_str(value)
    }
}

#[cfg(test)]
mod spec {
    use juniper::{DefaultScalarValue, InputValue, Value};
    use service::domain::{booking, pricing};

    use crate::api;

    use super::Via;

    type Reference = Via<booking::Reference>;

    #[test]
    fn parses_valid_reference() {
        let input = InputValue::<DefaultScalarValue>::scalar("BK-ABCD2345");

        let parsed: api::booking::Reference =
            Reference::from_input(&input).unwrap();

        assert_eq!(
            Reference::to_output::<_, DefaultScalarValue>(&parsed),
            Value::scalar("BK-ABCD2345"),
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            InputValue::<DefaultScalarValue>::scalar("SL-ABCD2345"),
            InputValue::scalar("BK-ABCD0000"),
            InputValue::scalar(42),
        ] {
            let res: Result<api::booking::Reference, _> =
                Reference::from_input(&input);
            let err = res.unwrap_err();
            assert!(err.contains("BookingReference"), "unexpected: {err}");
        }
    }

    #[test]
    fn rejects_non_positive_usage() {
        let input = InputValue::<DefaultScalarValue>::scalar("0");

        let res: Result<api::equipment::Usage, _> =
            Via::<pricing::Usage>::from_input(&input);

        assert!(res.is_err());
    }
}
