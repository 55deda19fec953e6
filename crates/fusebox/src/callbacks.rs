// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::args::{OutcomeArgs, StateChangeArgs};

crate::define_fn_wrapper!(IsFailure<E>(Fn(error: &E) -> bool));
crate::define_fn_wrapper!(OnStateChange(Fn(args: StateChangeArgs)));
crate::define_fn_wrapper!(OnSuccess(Fn(args: OutcomeArgs)));
crate::define_fn_wrapper!(OnFailure<E>(Fn(error: &E, args: OutcomeArgs)));
