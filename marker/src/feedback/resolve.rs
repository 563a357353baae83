//! # Configuration resolution
//!
//! A test or suite carries a primary configuration and optionally a
//! stricter (or looser) one for the group's final submission once the
//! deadline has passed. Which one applies is decided in this order:
//!
//! 1. max feedback requested: the maximal configuration;
//! 2. no post-deadline configuration: primary;
//! 3. not the group's most recent submission: primary;
//! 4. no closing time, or `now` not yet past the group's deadline: primary;
//! 5. otherwise the post-deadline configuration.

use db::models::{
    FeedbackConfiguration, StudentSuiteFeedbackConfiguration, StudentTestSuite, TestCaseBase,
};

use super::FeedbackContext;

/// Picks between `primary` and `post_deadline` for the submission in `ctx`.
pub fn select_config<C: Copy>(
    ctx: &FeedbackContext<'_>,
    primary: C,
    post_deadline: Option<C>,
    max: C,
) -> C {
    if ctx.max_feedback {
        return max;
    }
    let Some(post_deadline) = post_deadline else {
        return primary;
    };
    if !ctx.group.is_final_submission(ctx.submission_id) {
        return primary;
    }
    match ctx.group.effective_deadline(ctx.project) {
        Some(deadline) if ctx.now > deadline => post_deadline,
        _ => primary,
    }
}

pub fn test_case_config(ctx: &FeedbackContext<'_>, base: &TestCaseBase) -> FeedbackConfiguration {
    select_config(
        ctx,
        base.feedback_configuration,
        base.post_deadline_final_submission_feedback_configuration,
        FeedbackConfiguration::max(),
    )
}

pub fn student_suite_config(
    ctx: &FeedbackContext<'_>,
    suite: &StudentTestSuite,
) -> StudentSuiteFeedbackConfiguration {
    select_config(
        ctx,
        suite.feedback_configuration,
        suite.post_deadline_final_submission_feedback_configuration,
        StudentSuiteFeedbackConfiguration::max(),
    )
}
