//! Single-producer/single-consumer sample rings (spec §4.2, §5): the host
//! callback produces into the input ring and the frame loop consumes it;
//! the frame loop produces into the output ring and the host callback
//! drains it. Pre-sized at stream creation — never reallocated on the
//! audio thread, matching the teacher's own `rtrb`-based capture rings.

const FRAME_LEN: usize = 480;

pub struct RingProducer {
    inner: rtrb::Producer<f32>,
}

pub struct RingConsumer {
    inner: rtrb::Consumer<f32>,
}

/// Creates a ring sized `>= buffer_size + FRAME_LEN` per spec §4.2 so that
/// under nominal scheduling overflow is impossible.
pub fn new_ring(buffer_size: usize) -> (RingProducer, RingConsumer) {
    let capacity = buffer_size + FRAME_LEN;
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (RingProducer { inner: producer }, RingConsumer { inner: consumer })
}

impl RingProducer {
    /// Pushes as many samples as fit; returns the number actually written.
    /// Samples that don't fit are dropped by the caller, who is expected to
    /// count them as `dropped_frames` (spec §5 backpressure policy).
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        let mut written = 0;
        for &sample in samples {
            if self.inner.push(sample).is_err() {
                break;
            }
            written += 1;
        }
        written
    }

    pub fn slots(&self) -> usize {
        self.inner.slots()
    }
}

impl RingConsumer {
    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops exactly one 480-sample frame. Caller must check `len() >= 480`
    /// first (spec §4.2 step 3).
    pub fn pop_frame(&mut self, out: &mut [f32; FRAME_LEN]) {
        for slot in out.iter_mut() {
            *slot = self.inner.pop().unwrap_or(0.0);
        }
    }

    /// Drains up to `out.len()` samples, filling the tail with silence and
    /// returning the number of samples that underflowed (spec §4.2: "the
    /// host callback fills the output block by draining N samples; if the
    /// ring underflows, emit silence for the missing tail").
    pub fn drain_into(&mut self, out: &mut [f32]) -> usize {
        let mut deficit = 0;
        for slot in out.iter_mut() {
            match self.inner.pop() {
                Ok(sample) => *slot = sample,
                Err(_) => {
                    *slot = 0.0;
                    deficit += 1;
                }
            }
        }
        deficit
    }
}
