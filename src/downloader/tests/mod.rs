use super::test_helpers::{
    StubRunner, create_test_downloader, create_test_downloader_with, test_config,
};
use super::*;
use crate::error::ProcessError;
use crate::format::map_format;
use crate::types::{DownloadRequest, JobResult, JobState};
use std::time::Duration;
