//! Runs a one-off async call from synchronous code on a fresh current-thread
//! runtime. Same pattern as `attendance_writers::http_client::block_on`,
//! needed here because [`crate::gallery_client::HttpGalleryClient`] sits
//! behind the synchronous `BackendGalleryClient` trait the recognizer calls
//! from a plain worker thread.

use std::future::Future;

pub fn block_on<F: Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build current-thread runtime")
        .block_on(fut)
}
