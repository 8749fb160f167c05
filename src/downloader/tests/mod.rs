use super::test_helpers::*;
use super::*;
use crate::config::{FileCollisionAction, StaleJobPolicy};
use crate::error::{JobError, ValidationError};
use crate::notifications::NotificationKind;
use crate::types::{Event, ExtractionMode, JobState, MediaFormat};
use std::sync::Arc;
use std::time::Duration;
