/// Trickle ICE candidate as exchanged with browsers
/// (`candidate`, `sdpMid`, `sdpMLineIndex`, `usernameFragment`).
pub type IceCandidate = webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
