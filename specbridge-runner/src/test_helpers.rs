// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    description::Description,
    outcome::{FailureInfo, InvocationOutcome},
};
use proptest::{collection::vec, option, prelude::*};

/// Descriptions one to four segments deep, in a handful of groups.
pub(crate) fn arb_description() -> impl Strategy<Value = Description> {
    ("[A-C]", vec("[a-z]{1,3}", 0..4)).prop_map(|(group, rest)| {
        let mut description = Description::group(group);
        for segment in rest {
            description = description.child(segment);
        }
        description
    })
}

pub(crate) fn arb_failure() -> impl Strategy<Value = FailureInfo> {
    ("[a-z ]{0,16}", option::of("[a-z:0-9\n]{1,32}")).prop_map(|(message, stack_trace)| {
        let failure = FailureInfo::new(message);
        match stack_trace {
            Some(stack_trace) => failure.with_stack_trace(stack_trace),
            None => failure,
        }
    })
}

pub(crate) fn arb_outcome() -> impl Strategy<Value = InvocationOutcome> {
    prop_oneof![
        Just(InvocationOutcome::Success),
        arb_failure().prop_map(|failure| InvocationOutcome::Failure { failure }),
        arb_failure().prop_map(|failure| InvocationOutcome::Error { failure }),
        option::of("[a-z ]{1,12}").prop_map(|reason| InvocationOutcome::Ignored { reason }),
    ]
}
