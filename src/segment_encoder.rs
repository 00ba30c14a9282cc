use crate::Result;
use crate::segments::SpeechSegment;

pub trait SegmentEncoder {
    fn write_segment(&mut self, seg: &SpeechSegment) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}
